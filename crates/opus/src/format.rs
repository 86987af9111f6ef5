// SPDX-License-Identifier: MPL-2.0
use crate::error::Error;
use std::fmt::{Display, Error as FmtError, Formatter};

/// Largest frame libopus handles: 120 ms at 48 kHz.
pub const MAX_FRAME_SIZE: usize = 5760;

/// A sampling rate libopus can be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum SampleRate {
	Hz8000 = 8000,
	Hz12000 = 12000,
	Hz16000 = 16000,
	Hz24000 = 24000,
	Hz48000 = 48000,
}

impl SampleRate {
	pub const ALL: [SampleRate; 5] = [
		Self::Hz8000,
		Self::Hz12000,
		Self::Hz16000,
		Self::Hz24000,
		Self::Hz48000,
	];

	pub fn hz(self) -> i32 {
		self as i32
	}

	/// Samples per channel in a frame of `millis` milliseconds.
	///
	/// Opus also supports 2.5 ms frames; use [`SampleRate::hz`] `/ 400` for those.
	pub fn frame_size(self, millis: u32) -> usize {
		self.hz() as usize * millis as usize / 1000
	}
}

impl TryFrom<i32> for SampleRate {
	type Error = Error;

	fn try_from(value: i32) -> Result<Self, Self::Error> {
		Self::ALL
			.into_iter()
			.find(|rate| rate.hz() == value)
			.ok_or(Error::InvalidSampleRate(value))
	}
}

impl TryFrom<u32> for SampleRate {
	type Error = Error;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		i32::try_from(value)
			.map_err(|_| Error::SampleRateOutOfRange(value))
			.and_then(Self::try_from)
	}
}

impl From<SampleRate> for i32 {
	fn from(value: SampleRate) -> Self {
		value.hz()
	}
}

impl Display for SampleRate {
	fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
		write!(f, "{} Hz", self.hz())
	}
}

/// Channel layout of interleaved PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Channels {
	Mono = 1,
	Stereo = 2,
}

impl Channels {
	pub fn count(self) -> usize {
		self as usize
	}
}

impl TryFrom<i32> for Channels {
	type Error = Error;

	fn try_from(value: i32) -> Result<Self, Self::Error> {
		match value {
			1 => Ok(Self::Mono),
			2 => Ok(Self::Stereo),
			other => Err(Error::InvalidChannels(other)),
		}
	}
}

impl TryFrom<u16> for Channels {
	type Error = Error;

	fn try_from(value: u16) -> Result<Self, Self::Error> {
		Self::try_from(i32::from(value))
	}
}

impl From<Channels> for i32 {
	fn from(value: Channels) -> Self {
		value as i32
	}
}

/// Rejects zero and anything beyond the 120 ms libopus maximum.
pub(crate) fn check_frame_size(frame_size: usize) -> Result<(), Error> {
	if frame_size == 0 || frame_size > MAX_FRAME_SIZE {
		return Err(Error::InvalidFrameSize(frame_size));
	}
	Ok(())
}
