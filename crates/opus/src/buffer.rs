// SPDX-License-Identifier: MPL-2.0
//! Marshaling between host sample buffers and the memory libopus reads and
//! writes.
//!
//! libopus works on interleaved native-endian `i16` PCM and raw packet bytes.
//! Hosts exchange PCM as little-endian byte streams, so decoded audio leaves
//! through [`samples_to_le_bytes`] and byte input enters through
//! [`le_bytes_to_samples`]. Output memory is a [`NativeRegion`], allocated per
//! call and freed when it goes out of scope, whichever way the call exits.
use crate::error::{Error, Result};

/// A fixed-length, zero-initialized region libopus may write into.
#[derive(Debug)]
pub struct NativeRegion<T> {
	buf: Box<[T]>,
}

impl<T: Copy + Default> NativeRegion<T> {
	pub fn zeroed(len: usize) -> Self {
		Self {
			buf: vec![T::default(); len].into_boxed_slice(),
		}
	}

	pub fn copy_of(src: &[T]) -> Self {
		Self {
			buf: src.to_vec().into_boxed_slice(),
		}
	}
}

impl<T> NativeRegion<T> {
	pub fn as_ptr(&self) -> *const T {
		self.buf.as_ptr()
	}

	pub fn as_mut_ptr(&mut self) -> *mut T {
		self.buf.as_mut_ptr()
	}

	/// Length as the `opus_int32` libopus expects.
	pub fn native_len(&self) -> Result<i32> {
		native_len(self.buf.len())
	}

	/// The first `count` elements, which the native call reported as written.
	/// A `count` past the end keeps the whole region.
	pub fn into_vec(self, count: usize) -> Vec<T> {
		let mut vec = self.buf.into_vec();
		vec.truncate(count);
		vec
	}
}

/// Converts a host-side length into an `opus_int32`.
pub fn native_len(len: usize) -> Result<i32> {
	i32::try_from(len).map_err(|_| Error::BufferTooLarge(len))
}

/// Serializes interleaved samples as little-endian bytes, two per sample.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
	samples
		.iter()
		.flat_map(|sample| sample.to_le_bytes())
		.collect()
}

/// Parses little-endian 16-bit PCM bytes into interleaved samples.
pub fn le_bytes_to_samples(bytes: &[u8]) -> Result<Vec<i16>> {
	if bytes.len() % 2 != 0 {
		return Err(Error::OddPcmByteLength(bytes.len()));
	}
	Ok(bytes
		.chunks_exact(2)
		.map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
		.collect())
}
