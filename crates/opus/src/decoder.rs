// SPDX-License-Identifier: MPL-2.0
use crate::{
	abi::OpusAbi,
	buffer::{samples_to_le_bytes, NativeRegion},
	error::{CodecKind, Error, Result},
	format::{check_frame_size, Channels, SampleRate},
	handle::{Decoding, NativeHandle},
	library, map_error,
};
use earshot_opus_sys::{
	OPUS_GET_LAST_PACKET_DURATION_REQUEST, OPUS_GET_SAMPLE_RATE_REQUEST, OPUS_OK,
	OPUS_RESET_STATE, OPUS_SET_GAIN_REQUEST,
};
use std::os::raw::c_int;

/// Forward error correction is never requested when decoding.
const DECODE_FEC: c_int = 0;

/// An Opus decoder owning one native decoder instance.
///
/// The native instance carries state from one packet to the next, so packets
/// must be fed in stream order. Dropping the decoder disposes it.
pub struct OpusDecoder {
	handle: NativeHandle<Decoding>,
	sample_rate: SampleRate,
	channels: Channels,
}

impl OpusDecoder {
	/// Creates a decoder on the process-wide libopus, resolving it if needed.
	pub fn new(sample_rate: SampleRate, channels: Channels) -> Result<Self> {
		Self::with_abi(library::resolve()?, sample_rate, channels)
	}

	pub fn with_abi(
		abi: &'static dyn OpusAbi,
		sample_rate: SampleRate,
		channels: Channels,
	) -> Result<Self> {
		let mut status = OPUS_OK;
		// SAFETY: `status` is a valid out-pointer for the duration of the call.
		let state =
			unsafe { abi.decoder_create(sample_rate.into(), channels.into(), &mut status) };
		Ok(Self {
			handle: NativeHandle::adopt(abi, state, status)?,
			sample_rate,
			channels,
		})
	}

	pub fn sample_rate(&self) -> SampleRate {
		self.sample_rate
	}

	pub fn channels(&self) -> Channels {
		self.channels
	}

	/// Decodes one packet into little-endian 16-bit PCM bytes, channels
	/// interleaved.
	///
	/// `frame_size` is the most samples per channel the packet may decode to.
	pub fn decode(&mut self, packet: &[u8], frame_size: usize) -> Result<Vec<u8>> {
		self.decode_samples(packet, frame_size)
			.map(|samples| samples_to_le_bytes(&samples))
	}

	/// Decodes one packet into interleaved samples.
	pub fn decode_samples(&mut self, packet: &[u8], frame_size: usize) -> Result<Vec<i16>> {
		self.decode_raw(Some(packet), frame_size)
	}

	/// Conceals a lost packet, producing `frame_size` samples per channel of
	/// extrapolated audio.
	pub fn decode_lost(&mut self, frame_size: usize) -> Result<Vec<i16>> {
		self.decode_raw(None, frame_size)
	}

	fn decode_raw(&mut self, packet: Option<&[u8]>, frame_size: usize) -> Result<Vec<i16>> {
		let state = self.handle.live()?;
		check_frame_size(frame_size)?;
		let channels = self.channels.count();
		let input = packet.map(NativeRegion::copy_of);
		let (data, len) = match &input {
			Some(region) => (region.as_ptr(), region.native_len()?),
			None => (std::ptr::null(), 0),
		};
		let mut pcm = NativeRegion::<i16>::zeroed(frame_size * channels);
		// SAFETY: `state` is live, `data` is null or readable for `len` bytes and
		// `pcm` has room for `frame_size` samples on every channel.
		let decoded = unsafe {
			self.handle.abi().decode(
				state,
				data,
				len,
				pcm.as_mut_ptr(),
				frame_size as c_int,
				DECODE_FEC,
			)
		};
		let per_channel =
			map_error!(usize, decoded).map_err(|code| Error::TransformFailed {
				direction: CodecKind::Decoder,
				code,
			})?;
		tracing::trace!(
			packet_bytes = len,
			samples = per_channel,
			"decoded opus packet"
		);
		Ok(pcm.into_vec(per_channel * channels))
	}

	/// Resets the codec state to be equivalent to a freshly initialized state.
	/// This should be called when switching streams in order to prevent the
	/// back to back decoding from giving different results from one at a time
	/// decoding.
	pub fn reset(&mut self) -> Result<()> {
		self.ctl(OPUS_RESET_STATE, 0)
	}

	/// Scales decoded output by `q8_db / 256` dB, in -32768..=32767.
	pub fn set_gain(&mut self, q8_db: i32) -> Result<()> {
		self.ctl(OPUS_SET_GAIN_REQUEST, q8_db)
	}

	/// Returns the sampling rate the decoder was initialized with, as libopus
	/// reports it.
	pub fn native_sample_rate(&mut self) -> Result<i32> {
		self.ctl_get(OPUS_GET_SAMPLE_RATE_REQUEST)
	}

	/// Returns the duration (in samples, at the current sampling rate) of the
	/// last packet successfully decoded or concealed.
	pub fn last_packet_duration(&mut self) -> Result<i32> {
		self.ctl_get(OPUS_GET_LAST_PACKET_DURATION_REQUEST)
	}

	fn ctl(&mut self, request: c_int, value: i32) -> Result<()> {
		let state = self.handle.live()?;
		// SAFETY: `state` is live and every request passed here takes an int.
		map_error!((), unsafe {
			self.handle.abi().decoder_ctl(state, request, value)
		})
		.map_err(|code| Error::ControlFailed {
			direction: CodecKind::Decoder,
			request,
			code,
		})
	}

	fn ctl_get(&mut self, request: c_int) -> Result<i32> {
		let state = self.handle.live()?;
		let mut value = 0;
		// SAFETY: `state` is live and `value` is a valid out-pointer.
		map_error!(&value, unsafe {
			self.handle
				.abi()
				.decoder_ctl_get(state, request, &mut value)
		})
		.map_err(|code| Error::ControlFailed {
			direction: CodecKind::Decoder,
			request,
			code,
		})
	}

	/// Destroys the native decoder. Calling this again is a no-op; any other
	/// method fails with [`Error::UseAfterDispose`] afterwards.
	pub fn dispose(&mut self) {
		self.handle.dispose();
	}

	pub fn is_disposed(&self) -> bool {
		self.handle.is_disposed()
	}
}
