// SPDX-License-Identifier: MPL-2.0
use earshot_opus_sys::{OpusDecoder, OpusEncoder};
use std::os::raw::c_int;

/// The libopus entry points a codec handle calls through.
///
/// [`OpusLibrary`](crate::library::OpusLibrary) implements this over the
/// resolved native library. Each method mirrors the C function of the same
/// name and shares its contract; the `ctl` pair is split into a setter taking
/// an `opus_int32` and a getter taking an out-pointer, since those are the
/// only two argument shapes the handles use.
pub trait OpusAbi: Send + Sync {
	/// # Safety
	/// `error` must be valid for a write.
	unsafe fn encoder_create(
		&self,
		sample_rate: i32,
		channels: c_int,
		application: c_int,
		error: *mut c_int,
	) -> *mut OpusEncoder;

	/// # Safety
	/// `st` must be a live encoder from this ABI, `pcm` must hold
	/// `frame_size * channels` samples and `data` must be writable for
	/// `max_data_bytes` bytes.
	unsafe fn encode(
		&self,
		st: *mut OpusEncoder,
		pcm: *const i16,
		frame_size: c_int,
		data: *mut u8,
		max_data_bytes: i32,
	) -> i32;

	/// # Safety
	/// `st` must be a live encoder from this ABI, and `request` must be a
	/// request taking an `opus_int32` argument.
	unsafe fn encoder_ctl(&self, st: *mut OpusEncoder, request: c_int, value: i32) -> c_int;

	/// # Safety
	/// `st` must be a live encoder from this ABI, `request` must be a request
	/// taking an `opus_int32 *` argument, and `out` must be valid for a write.
	unsafe fn encoder_ctl_get(&self, st: *mut OpusEncoder, request: c_int, out: *mut i32)
		-> c_int;

	/// # Safety
	/// `st` must be a live encoder from this ABI. It is dangling afterwards.
	unsafe fn encoder_destroy(&self, st: *mut OpusEncoder);

	/// # Safety
	/// `error` must be valid for a write.
	unsafe fn decoder_create(
		&self,
		sample_rate: i32,
		channels: c_int,
		error: *mut c_int,
	) -> *mut OpusDecoder;

	/// # Safety
	/// `st` must be a live decoder from this ABI, `data` must be null or
	/// readable for `len` bytes, and `pcm` must be writable for
	/// `frame_size * channels` samples.
	unsafe fn decode(
		&self,
		st: *mut OpusDecoder,
		data: *const u8,
		len: i32,
		pcm: *mut i16,
		frame_size: c_int,
		decode_fec: c_int,
	) -> c_int;

	/// # Safety
	/// See [`OpusAbi::encoder_ctl`].
	unsafe fn decoder_ctl(&self, st: *mut OpusDecoder, request: c_int, value: i32) -> c_int;

	/// # Safety
	/// See [`OpusAbi::encoder_ctl_get`].
	unsafe fn decoder_ctl_get(&self, st: *mut OpusDecoder, request: c_int, out: *mut i32)
		-> c_int;

	/// # Safety
	/// `st` must be a live decoder from this ABI. It is dangling afterwards.
	unsafe fn decoder_destroy(&self, st: *mut OpusDecoder);

	/// The library's version string.
	fn version(&self) -> String;
}

/// A scripted stand-in for libopus.
///
/// Its "codec" is lossless: a packet is a one-byte frame counter followed by
/// the PCM as little-endian bytes. The counter lives in the encoder state, so
/// interleaved use of two encoders shows up in their packets.
#[cfg(test)]
pub(crate) mod fake {
	use super::OpusAbi;
	use earshot_opus_sys::*;
	use std::{
		os::raw::c_int,
		sync::{
			atomic::{AtomicI32, AtomicUsize, Ordering},
			Mutex,
		},
	};

	#[derive(Default)]
	pub(crate) struct FakeOpus {
		pub created: AtomicUsize,
		pub destroyed: AtomicUsize,
		/// Non-zero makes every create report this status.
		pub create_status: AtomicI32,
		/// When set, every non-lost decode emits exactly these samples.
		pub decode_script: Mutex<Option<Vec<i16>>>,
	}

	impl FakeOpus {
		pub fn leaked() -> &'static Self {
			Box::leak(Box::default())
		}

		pub fn live(&self) -> usize {
			self.created.load(Ordering::SeqCst) - self.destroyed.load(Ordering::SeqCst)
		}
	}

	struct EncoderState {
		channels: usize,
		frames: u8,
		bitrate: i32,
		complexity: i32,
		packet_loss: i32,
	}

	struct DecoderState {
		sample_rate: i32,
		channels: usize,
		gain: i32,
		last_duration: i32,
	}

	fn valid_config(sample_rate: i32, channels: c_int) -> bool {
		matches!(sample_rate, 8000 | 12000 | 16000 | 24000 | 48000) && matches!(channels, 1 | 2)
	}

	impl OpusAbi for FakeOpus {
		unsafe fn encoder_create(
			&self,
			sample_rate: i32,
			channels: c_int,
			application: c_int,
			error: *mut c_int,
		) -> *mut OpusEncoder {
			let status = self.create_status.load(Ordering::SeqCst);
			if status != OPUS_OK {
				error.write(status);
				return std::ptr::null_mut();
			}
			if !valid_config(sample_rate, channels)
				|| !matches!(
					application,
					OPUS_APPLICATION_VOIP
						| OPUS_APPLICATION_AUDIO | OPUS_APPLICATION_RESTRICTED_LOWDELAY
				) {
				error.write(OPUS_BAD_ARG);
				return std::ptr::null_mut();
			}
			self.created.fetch_add(1, Ordering::SeqCst);
			error.write(OPUS_OK);
			Box::into_raw(Box::new(EncoderState {
				channels: channels as usize,
				frames: 0,
				bitrate: OPUS_AUTO,
				complexity: 9,
				packet_loss: 0,
			}))
			.cast()
		}

		unsafe fn encode(
			&self,
			st: *mut OpusEncoder,
			pcm: *const i16,
			frame_size: c_int,
			data: *mut u8,
			max_data_bytes: i32,
		) -> i32 {
			let state = &mut *st.cast::<EncoderState>();
			if frame_size <= 0 {
				return OPUS_BAD_ARG;
			}
			let samples = std::slice::from_raw_parts(pcm, frame_size as usize * state.channels);
			let len = 1 + samples.len() * 2;
			if len > max_data_bytes as usize {
				return OPUS_BUFFER_TOO_SMALL;
			}
			let out = std::slice::from_raw_parts_mut(data, len);
			out[0] = state.frames;
			for (chunk, sample) in out[1..].chunks_exact_mut(2).zip(samples) {
				chunk.copy_from_slice(&sample.to_le_bytes());
			}
			state.frames = state.frames.wrapping_add(1);
			len as i32
		}

		unsafe fn encoder_ctl(&self, st: *mut OpusEncoder, request: c_int, value: i32) -> c_int {
			let state = &mut *st.cast::<EncoderState>();
			match request {
				OPUS_SET_BITRATE_REQUEST => match value {
					OPUS_AUTO | OPUS_BITRATE_MAX | 500..=512000 => state.bitrate = value,
					_ => return OPUS_BAD_ARG,
				},
				OPUS_SET_COMPLEXITY_REQUEST if (0..=10).contains(&value) => {
					state.complexity = value
				}
				OPUS_SET_PACKET_LOSS_PERC_REQUEST if (0..=100).contains(&value) => {
					state.packet_loss = value
				}
				OPUS_SET_VBR_REQUEST | OPUS_SET_INBAND_FEC_REQUEST | OPUS_SET_DTX_REQUEST
					if (0..=1).contains(&value) => {}
				OPUS_RESET_STATE => state.frames = 0,
				OPUS_SET_COMPLEXITY_REQUEST
				| OPUS_SET_PACKET_LOSS_PERC_REQUEST
				| OPUS_SET_VBR_REQUEST
				| OPUS_SET_INBAND_FEC_REQUEST
				| OPUS_SET_DTX_REQUEST => return OPUS_BAD_ARG,
				_ => return OPUS_UNIMPLEMENTED,
			}
			OPUS_OK
		}

		unsafe fn encoder_ctl_get(
			&self,
			st: *mut OpusEncoder,
			request: c_int,
			out: *mut i32,
		) -> c_int {
			let state = &*st.cast::<EncoderState>();
			let value = match request {
				OPUS_GET_BITRATE_REQUEST => state.bitrate,
				OPUS_GET_COMPLEXITY_REQUEST => state.complexity,
				OPUS_GET_PACKET_LOSS_PERC_REQUEST => state.packet_loss,
				_ => return OPUS_UNIMPLEMENTED,
			};
			out.write(value);
			OPUS_OK
		}

		unsafe fn encoder_destroy(&self, st: *mut OpusEncoder) {
			drop(Box::from_raw(st.cast::<EncoderState>()));
			self.destroyed.fetch_add(1, Ordering::SeqCst);
		}

		unsafe fn decoder_create(
			&self,
			sample_rate: i32,
			channels: c_int,
			error: *mut c_int,
		) -> *mut OpusDecoder {
			let status = self.create_status.load(Ordering::SeqCst);
			if status != OPUS_OK {
				error.write(status);
				return std::ptr::null_mut();
			}
			if !valid_config(sample_rate, channels) {
				error.write(OPUS_BAD_ARG);
				return std::ptr::null_mut();
			}
			self.created.fetch_add(1, Ordering::SeqCst);
			error.write(OPUS_OK);
			Box::into_raw(Box::new(DecoderState {
				sample_rate,
				channels: channels as usize,
				gain: 0,
				last_duration: 0,
			}))
			.cast()
		}

		unsafe fn decode(
			&self,
			st: *mut OpusDecoder,
			data: *const u8,
			len: i32,
			pcm: *mut i16,
			frame_size: c_int,
			decode_fec: c_int,
		) -> c_int {
			let state = &mut *st.cast::<DecoderState>();
			if frame_size <= 0 || decode_fec != 0 {
				return OPUS_BAD_ARG;
			}
			let out = std::slice::from_raw_parts_mut(pcm, frame_size as usize * state.channels);
			if data.is_null() || len == 0 {
				out.fill(0);
				state.last_duration = frame_size;
				return frame_size;
			}
			let packet = std::slice::from_raw_parts(data, len as usize);
			let samples: Vec<i16> = match self.decode_script.lock() {
				Ok(script) => match script.as_ref() {
					Some(samples) => samples.clone(),
					None => packet[1..]
						.chunks_exact(2)
						.map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
						.collect(),
				},
				Err(_) => return OPUS_INTERNAL_ERROR,
			};
			if samples.is_empty() || samples.len() % state.channels != 0 {
				return OPUS_INVALID_PACKET;
			}
			if samples.len() > out.len() {
				return OPUS_BUFFER_TOO_SMALL;
			}
			out[..samples.len()].copy_from_slice(&samples);
			let per_channel = (samples.len() / state.channels) as c_int;
			state.last_duration = per_channel;
			per_channel
		}

		unsafe fn decoder_ctl(&self, st: *mut OpusDecoder, request: c_int, value: i32) -> c_int {
			let state = &mut *st.cast::<DecoderState>();
			match request {
				OPUS_SET_GAIN_REQUEST if (-32768..=32767).contains(&value) => state.gain = value,
				OPUS_SET_GAIN_REQUEST => return OPUS_BAD_ARG,
				OPUS_RESET_STATE => state.last_duration = 0,
				_ => return OPUS_UNIMPLEMENTED,
			}
			OPUS_OK
		}

		unsafe fn decoder_ctl_get(
			&self,
			st: *mut OpusDecoder,
			request: c_int,
			out: *mut i32,
		) -> c_int {
			let state = &*st.cast::<DecoderState>();
			let value = match request {
				OPUS_GET_SAMPLE_RATE_REQUEST => state.sample_rate,
				OPUS_GET_LAST_PACKET_DURATION_REQUEST => state.last_duration,
				_ => return OPUS_UNIMPLEMENTED,
			};
			out.write(value);
			OPUS_OK
		}

		unsafe fn decoder_destroy(&self, st: *mut OpusDecoder) {
			drop(Box::from_raw(st.cast::<DecoderState>()));
			self.destroyed.fetch_add(1, Ordering::SeqCst);
		}

		fn version(&self) -> String {
			"libopus 1.5.2-fake".to_owned()
		}
	}
}
