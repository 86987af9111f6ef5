// SPDX-License-Identifier: MPL-2.0
use crate::{
	abi::OpusAbi,
	application::OpusApplication,
	buffer::{native_len, NativeRegion},
	encode::OpusEncodable,
	error::{CodecKind, Error, Result},
	format::{check_frame_size, Channels, SampleRate},
	handle::{Encoding, NativeHandle},
	library, map_error,
};
use earshot_opus_sys::{
	OPUS_GET_BITRATE_REQUEST, OPUS_GET_COMPLEXITY_REQUEST, OPUS_GET_PACKET_LOSS_PERC_REQUEST,
	OPUS_OK, OPUS_RESET_STATE, OPUS_SET_BITRATE_REQUEST, OPUS_SET_COMPLEXITY_REQUEST,
	OPUS_SET_DTX_REQUEST, OPUS_SET_INBAND_FEC_REQUEST, OPUS_SET_PACKET_LOSS_PERC_REQUEST,
	OPUS_SET_VBR_REQUEST,
};
use std::os::raw::c_int;

/// Output capacity for a single encoded packet; comfortably above the
/// largest packet libopus produces.
pub const MAX_PACKET_BYTES: usize = 4000;

/// An Opus encoder owning one native encoder instance.
///
/// Each call continues the stream started by the previous one. Dropping the
/// encoder disposes it.
pub struct OpusEncoder {
	handle: NativeHandle<Encoding>,
	sample_rate: SampleRate,
	channels: Channels,
	application: OpusApplication,
}

impl OpusEncoder {
	/// Creates an encoder on the process-wide libopus, resolving it if needed.
	pub fn new(
		sample_rate: SampleRate,
		channels: Channels,
		application: OpusApplication,
	) -> Result<Self> {
		Self::with_abi(library::resolve()?, sample_rate, channels, application)
	}

	pub fn with_abi(
		abi: &'static dyn OpusAbi,
		sample_rate: SampleRate,
		channels: Channels,
		application: OpusApplication,
	) -> Result<Self> {
		let mut status = OPUS_OK;
		// SAFETY: `status` is a valid out-pointer for the duration of the call.
		let state = unsafe {
			abi.encoder_create(
				sample_rate.into(),
				channels.into(),
				application.into(),
				&mut status,
			)
		};
		Ok(Self {
			handle: NativeHandle::adopt(abi, state, status)?,
			sample_rate,
			channels,
			application,
		})
	}

	pub fn sample_rate(&self) -> SampleRate {
		self.sample_rate
	}

	pub fn channels(&self) -> Channels {
		self.channels
	}

	pub fn application(&self) -> OpusApplication {
		self.application
	}

	/// Encodes one frame of `frame_size` samples per channel.
	///
	/// `pcm` must hold exactly `frame_size * channels` interleaved samples.
	pub fn encode<T: OpusEncodable + ?Sized>(
		&mut self,
		pcm: &T,
		frame_size: usize,
	) -> Result<Vec<u8>> {
		let mut data = NativeRegion::<u8>::zeroed(MAX_PACKET_BYTES);
		let capacity = data.native_len()?;
		let len = self.encode_raw(pcm, frame_size, data.as_mut_ptr(), capacity)?;
		Ok(data.into_vec(len))
	}

	/// Encodes one frame into `data`, returning how many bytes were written.
	pub fn encode_into<T: OpusEncodable + ?Sized>(
		&mut self,
		pcm: &T,
		frame_size: usize,
		data: &mut [u8],
	) -> Result<usize> {
		let capacity = native_len(data.len())?;
		let len = self.encode_raw(pcm, frame_size, data.as_mut_ptr(), capacity)?;
		Ok(len.min(data.len()))
	}

	fn encode_raw<T: OpusEncodable + ?Sized>(
		&mut self,
		pcm: &T,
		frame_size: usize,
		data: *mut u8,
		capacity: i32,
	) -> Result<usize> {
		let state = self.handle.live()?;
		check_frame_size(frame_size)?;
		let samples = pcm.samples()?;
		let expected = frame_size * self.channels.count();
		if samples.len() != expected {
			return Err(Error::PcmLengthMismatch {
				expected,
				actual: samples.len(),
			});
		}
		// SAFETY: `state` is live, `samples` holds a whole frame and `data` is
		// writable for `capacity` bytes.
		let written = unsafe {
			self.handle.abi().encode(
				state,
				samples.as_ptr(),
				frame_size as c_int,
				data,
				capacity,
			)
		};
		let written = map_error!(usize, written).map_err(|code| Error::TransformFailed {
			direction: CodecKind::Encoder,
			code,
		})?;
		tracing::trace!(frame_size, bytes = written, "encoded opus frame");
		Ok(written)
	}

	/// Sets the target bitrate in bits per second. libopus also accepts
	/// `OPUS_AUTO` and `OPUS_BITRATE_MAX`.
	pub fn set_bitrate(&mut self, bits_per_second: i32) -> Result<()> {
		self.ctl(OPUS_SET_BITRATE_REQUEST, bits_per_second)
	}

	/// Returns the encoder's configured bitrate.
	pub fn bitrate(&mut self) -> Result<i32> {
		self.ctl_get(OPUS_GET_BITRATE_REQUEST)
	}

	/// Sets the computational complexity, from 0 (fastest) to 10 (best).
	pub fn set_complexity(&mut self, complexity: i32) -> Result<()> {
		self.handle.live()?;
		if !(0..=10).contains(&complexity) {
			return Err(Error::InvalidComplexity(complexity));
		}
		self.ctl(OPUS_SET_COMPLEXITY_REQUEST, complexity)
	}

	pub fn complexity(&mut self) -> Result<i32> {
		self.ctl_get(OPUS_GET_COMPLEXITY_REQUEST)
	}

	/// Returns the encoder's configured packet loss percentage, 0-100
	/// inclusive (default: 0).
	pub fn expected_packet_loss(&mut self) -> Result<i32> {
		self.ctl_get(OPUS_GET_PACKET_LOSS_PERC_REQUEST)
	}

	/// Configures the encoder's expected packet loss percentage.
	/// Higher values trigger progressively more loss resistant behavior in the
	/// encoder at the expense of quality at a given bitrate in the absence of
	/// packet loss, but greater quality under loss.
	///
	/// `percentage` is the loss percentage in range 0-100, inclusive (default:
	/// 0).
	pub fn set_expected_packet_loss(&mut self, percentage: i32) -> Result<()> {
		self.ctl(OPUS_SET_PACKET_LOSS_PERC_REQUEST, percentage)
	}

	pub fn set_vbr(&mut self, enabled: bool) -> Result<()> {
		self.ctl(OPUS_SET_VBR_REQUEST, enabled.into())
	}

	/// Lets the encoder embed redundancy a decoder can use to recover a lost
	/// previous packet.
	pub fn set_inband_fec(&mut self, enabled: bool) -> Result<()> {
		self.ctl(OPUS_SET_INBAND_FEC_REQUEST, enabled.into())
	}

	/// Discontinuous transmission: send near-empty packets during silence.
	pub fn set_dtx(&mut self, enabled: bool) -> Result<()> {
		self.ctl(OPUS_SET_DTX_REQUEST, enabled.into())
	}

	/// Resets the codec state to be equivalent to a freshly initialized state,
	/// keeping the configured bitrate and complexity. Call it before encoding
	/// an unrelated stream so its first packets don't depend on the last one.
	pub fn reset(&mut self) -> Result<()> {
		self.ctl(OPUS_RESET_STATE, 0)
	}

	fn ctl(&mut self, request: c_int, value: i32) -> Result<()> {
		let state = self.handle.live()?;
		// SAFETY: `state` is live and every request passed here takes an int.
		map_error!((), unsafe {
			self.handle.abi().encoder_ctl(state, request, value)
		})
		.map_err(|code| Error::ControlFailed {
			direction: CodecKind::Encoder,
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
				.encoder_ctl_get(state, request, &mut value)
		})
		.map_err(|code| Error::ControlFailed {
			direction: CodecKind::Encoder,
			request,
			code,
		})
	}

	/// Destroys the native encoder. Calling this again is a no-op; any other
	/// method fails with [`Error::UseAfterDispose`] afterwards.
	pub fn dispose(&mut self) {
		self.handle.dispose();
	}

	pub fn is_disposed(&self) -> bool {
		self.handle.is_disposed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{abi::fake::FakeOpus, buffer::samples_to_le_bytes, error::OpusErrorCode};

	fn encoder(channels: Channels) -> (&'static FakeOpus, OpusEncoder) {
		let fake = FakeOpus::leaked();
		let encoder = OpusEncoder::with_abi(
			fake,
			SampleRate::Hz48000,
			channels,
			OpusApplication::default(),
		)
		.unwrap();
		(fake, encoder)
	}

	#[test]
	fn packet_carries_native_output() {
		let (_, mut encoder) = encoder(Channels::Stereo);
		let packet = encoder.encode(&[1i16, -1], 1).unwrap();
		assert_eq!(packet, [0, 0x01, 0x00, 0xff, 0xff]);
		// the frame counter shows continuation state advancing
		let packet = encoder.encode(&[2i16, 3], 1).unwrap();
		assert_eq!(packet[0], 1);
	}

	#[test]
	fn byte_input_matches_sample_input() {
		let (_, mut a) = encoder(Channels::Mono);
		let (_, mut b) = encoder(Channels::Mono);
		let samples: Vec<i16> = (0..960).map(|i| (i * 31) as i16).collect();
		let bytes = samples_to_le_bytes(&samples);
		assert_eq!(a.encode(&samples, 960), b.encode(&bytes, 960));
	}

	#[test]
	fn output_fits_packet_capacity() {
		let (_, mut encoder) = encoder(Channels::Stereo);
		let packet = encoder.encode(&vec![0i16; 960 * 2], 960).unwrap();
		assert!(!packet.is_empty());
		assert!(packet.len() <= MAX_PACKET_BYTES);
	}

	#[test]
	fn small_caller_buffer_is_a_native_error() {
		let (_, mut encoder) = encoder(Channels::Mono);
		let mut data = [0u8; 8];
		let err = encoder
			.encode_into(&vec![0i16; 480], 480, &mut data)
			.unwrap_err();
		assert_eq!(err.native_code(), Some(OpusErrorCode::BufferTooSmall));
		assert_eq!(encoder.encode_into(&[7i16, 8], 2, &mut data), Ok(5));
	}

	#[test]
	fn pcm_length_must_match_frame() {
		let (_, mut encoder) = encoder(Channels::Stereo);
		assert_eq!(
			encoder.encode(&vec![0i16; 960], 960),
			Err(Error::PcmLengthMismatch {
				expected: 1920,
				actual: 960
			})
		);
		assert_eq!(
			encoder.encode(&[0u8; 3][..], 1),
			Err(Error::OddPcmByteLength(3))
		);
		assert_eq!(encoder.encode(&[0i16; 0], 0), Err(Error::InvalidFrameSize(0)));
	}

	#[test]
	fn configuration_round_trips() {
		let (_, mut encoder) = encoder(Channels::Mono);
		encoder.set_bitrate(24000).unwrap();
		encoder.set_complexity(5).unwrap();
		encoder.set_expected_packet_loss(10).unwrap();
		encoder.set_vbr(false).unwrap();
		encoder.set_inband_fec(true).unwrap();
		encoder.set_dtx(true).unwrap();
		assert_eq!(encoder.bitrate(), Ok(24000));
		assert_eq!(encoder.complexity(), Ok(5));
		assert_eq!(encoder.expected_packet_loss(), Ok(10));
	}

	#[test]
	fn rejected_configuration_is_surfaced() {
		let (_, mut encoder) = encoder(Channels::Mono);
		assert_eq!(
			encoder.set_bitrate(12),
			Err(Error::ControlFailed {
				direction: CodecKind::Encoder,
				request: OPUS_SET_BITRATE_REQUEST,
				code: OpusErrorCode::BadArg
			})
		);
		assert_eq!(encoder.set_complexity(11), Err(Error::InvalidComplexity(11)));
		assert_eq!(encoder.set_complexity(-1), Err(Error::InvalidComplexity(-1)));
	}

	#[test]
	fn reset_restarts_the_stream() {
		let (_, mut encoder) = encoder(Channels::Mono);
		encoder.set_bitrate(32000).unwrap();
		encoder.encode(&[0i16], 1).unwrap();
		encoder.encode(&[0i16], 1).unwrap();
		encoder.reset().unwrap();
		assert_eq!(encoder.encode(&[0i16], 1).unwrap()[0], 0);
		assert_eq!(encoder.bitrate(), Ok(32000));
	}

	#[test]
	fn dispose_is_idempotent() {
		let (fake, mut encoder) = encoder(Channels::Mono);
		encoder.dispose();
		encoder.dispose();
		assert!(encoder.is_disposed());
		drop(encoder);
		assert_eq!(fake.live(), 0);
		assert_eq!(fake.destroyed.load(std::sync::atomic::Ordering::SeqCst), 1);
	}

	#[test]
	fn use_after_dispose_fails_every_time() {
		let (_, mut encoder) = encoder(Channels::Mono);
		encoder.dispose();
		let disposed = Error::UseAfterDispose(CodecKind::Encoder);
		for _ in 0..2 {
			assert_eq!(encoder.encode(&[0i16; 960], 960), Err(disposed.clone()));
			assert_eq!(
				encoder.encode_into(&[0i16; 960], 960, &mut [0; 16]),
				Err(disposed.clone())
			);
			assert_eq!(encoder.set_bitrate(64000), Err(disposed.clone()));
			// disposal wins over argument validation
			assert_eq!(encoder.set_complexity(42), Err(disposed.clone()));
			assert_eq!(encoder.complexity(), Err(disposed.clone()));
			assert_eq!(encoder.reset(), Err(disposed.clone()));
		}
	}

	#[test]
	fn invalid_native_config_yields_no_encoder() {
		let fake = FakeOpus::leaked();
		fake.create_status.store(
			earshot_opus_sys::OPUS_INTERNAL_ERROR,
			std::sync::atomic::Ordering::SeqCst,
		);
		let result = OpusEncoder::with_abi(
			fake,
			SampleRate::Hz8000,
			Channels::Mono,
			OpusApplication::Voip,
		);
		assert_eq!(
			result.err(),
			Some(Error::CreateFailed {
				direction: CodecKind::Encoder,
				code: OpusErrorCode::InternalError
			})
		);
	}
}
