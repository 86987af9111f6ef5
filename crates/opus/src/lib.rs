// SPDX-License-Identifier: MPL-2.0
//! Safe ownership of native libopus encoders and decoders.
//!
//! libopus is located at run time (see [`library`]), and each
//! [`OpusEncoder`]/[`OpusDecoder`] owns exactly one native instance until it
//! is disposed or dropped. Using a disposed codec is an
//! [`Error::UseAfterDispose`], never undefined behavior.
#![warn(
	clippy::correctness,
	clippy::suspicious,
	clippy::complexity,
	clippy::perf,
	clippy::style
)]
pub mod abi;
pub mod application;
pub mod buffer;
pub mod decoder;
pub mod encode;
pub mod format;
mod handle;
pub mod library;
#[macro_use]
pub mod error;

pub use crate::{
	abi::OpusAbi,
	application::OpusApplication,
	decoder::OpusDecoder,
	encode::{OpusEncodable, OpusEncoder, MAX_PACKET_BYTES},
	error::{CodecKind, Error, OpusErrorCode, Result},
	format::{Channels, SampleRate, MAX_FRAME_SIZE},
	library::{BindingStrategy, LocatorConfig, OpusLibrary},
};

/// Returns the libopus version string.
///
/// Applications may look for the substring "-fixed" in the version string to
/// determine whether they have a fixed-point or floating-point build at
/// runtime. Resolves the library if nothing has yet.
pub fn version() -> Result<String> {
	library::resolve().map(|library| library.version())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::abi::fake::FakeOpus;
	use std::{sync::Mutex, thread};

	fn tone(seed: i16, len: usize) -> Vec<i16> {
		(0..len)
			.map(|i| seed.wrapping_mul(i as i16).wrapping_add(seed))
			.collect()
	}

	#[test]
	fn concurrent_handles_stay_independent() {
		let fake = FakeOpus::leaked();
		thread::scope(|scope| {
			for seed in [3i16, 7, 11, 13] {
				scope.spawn(move || {
					let mut encoder = OpusEncoder::with_abi(
						fake,
						SampleRate::Hz16000,
						Channels::Stereo,
						OpusApplication::Voip,
					)
					.unwrap();
					let mut decoder =
						OpusDecoder::with_abi(fake, SampleRate::Hz16000, Channels::Stereo)
							.unwrap();
					for frame in 0..50u8 {
						let pcm = tone(seed.wrapping_add(frame.into()), 320 * 2);
						let packet = encoder.encode(&pcm, 320).unwrap();
						assert_eq!(packet[0], frame);
						assert_eq!(decoder.decode_samples(&packet, 320).unwrap(), pcm);
					}
				});
			}
		});
		assert_eq!(fake.live(), 0);
	}

	#[test]
	fn handles_move_between_threads_and_share_behind_a_lock() {
		let fake = FakeOpus::leaked();
		let encoder = Mutex::new(
			OpusEncoder::with_abi(fake, SampleRate::Hz8000, Channels::Mono, OpusApplication::Audio)
				.unwrap(),
		);
		thread::scope(|scope| {
			for _ in 0..4 {
				scope.spawn(|| {
					for _ in 0..10 {
						let mut encoder = encoder.lock().unwrap();
						encoder.encode(&[0i16; 160], 160).unwrap();
					}
				});
			}
		});
		let mut encoder = encoder.into_inner().unwrap();
		// 40 frames went through one stream, so the counter reads 40 next
		assert_eq!(encoder.encode(&[0i16; 160], 160).unwrap()[0], 40);
	}
}
