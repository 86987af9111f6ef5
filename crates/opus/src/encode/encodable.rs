// SPDX-License-Identifier: MPL-2.0
use crate::{buffer::le_bytes_to_samples, error::Result};
use std::borrow::Cow;

/// PCM input an [`OpusEncoder`](crate::OpusEncoder) accepts.
///
/// Interleaved `i16` samples are handed to libopus as they are. Byte buffers
/// are little-endian 16-bit PCM and get converted first.
pub trait OpusEncodable {
	fn samples(&self) -> Result<Cow<'_, [i16]>>;
}

impl OpusEncodable for [i16] {
	fn samples(&self) -> Result<Cow<'_, [i16]>> {
		Ok(Cow::Borrowed(self))
	}
}

impl OpusEncodable for [u8] {
	fn samples(&self) -> Result<Cow<'_, [i16]>> {
		le_bytes_to_samples(self).map(Cow::Owned)
	}
}

impl OpusEncodable for Vec<i16> {
	fn samples(&self) -> Result<Cow<'_, [i16]>> {
		self.as_slice().samples()
	}
}

impl OpusEncodable for Vec<u8> {
	fn samples(&self) -> Result<Cow<'_, [i16]>> {
		self.as_slice().samples()
	}
}

impl<const N: usize> OpusEncodable for [i16; N] {
	fn samples(&self) -> Result<Cow<'_, [i16]>> {
		self.as_slice().samples()
	}
}
