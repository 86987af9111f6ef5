// SPDX-License-Identifier: MPL-2.0
use crate::{
	abi::OpusAbi,
	error::{CodecKind, Error, OpusErrorCode, Result},
};
use earshot_opus_sys::{OpusDecoder, OpusEncoder, OPUS_OK};
use std::{os::raw::c_int, ptr::NonNull};

/// Which native state a [`NativeHandle`] owns, and how to free it.
pub(crate) trait Direction {
	type State;
	const KIND: CodecKind;

	/// # Safety
	/// `state` must have come from `abi`'s create function for this
	/// direction and must not be used again.
	unsafe fn destroy(abi: &dyn OpusAbi, state: *mut Self::State);
}

pub(crate) enum Encoding {}

impl Direction for Encoding {
	type State = OpusEncoder;
	const KIND: CodecKind = CodecKind::Encoder;

	unsafe fn destroy(abi: &dyn OpusAbi, state: *mut OpusEncoder) {
		abi.encoder_destroy(state)
	}
}

pub(crate) enum Decoding {}

impl Direction for Decoding {
	type State = OpusDecoder;
	const KIND: CodecKind = CodecKind::Decoder;

	unsafe fn destroy(abi: &dyn OpusAbi, state: *mut OpusDecoder) {
		abi.decoder_destroy(state)
	}
}

/// Sole owner of one native encoder or decoder instance.
///
/// The pointer is never copied out of the handle for longer than a single
/// native call. Disposing takes it out, so every later access reports
/// [`Error::UseAfterDispose`] instead of reaching freed memory.
pub(crate) struct NativeHandle<D: Direction> {
	abi: &'static dyn OpusAbi,
	state: Option<NonNull<D::State>>,
}

// SAFETY: libopus state has no thread affinity. The handle is deliberately
// not `Sync`: every call mutates the state, so callers need `&mut` access.
unsafe impl<D: Direction> Send for NativeHandle<D> {}

impl<D: Direction> NativeHandle<D> {
	/// Takes ownership of whatever a native create call returned.
	///
	/// Only a non-null instance with an `OPUS_OK` status becomes a handle. An
	/// instance returned alongside an error status is destroyed right away.
	pub fn adopt(abi: &'static dyn OpusAbi, state: *mut D::State, status: c_int) -> Result<Self> {
		let failed = |code| Error::CreateFailed {
			direction: D::KIND,
			code,
		};
		match (status, NonNull::new(state)) {
			(OPUS_OK, Some(state)) => {
				tracing::debug!(direction = %D::KIND, "created opus instance");
				Ok(Self {
					abi,
					state: Some(state),
				})
			}
			(OPUS_OK, None) => Err(failed(OpusErrorCode::AllocFail)),
			(status, state) => {
				if let Some(state) = state {
					// SAFETY: freshly created by `abi` and never handed out.
					unsafe { D::destroy(abi, state.as_ptr()) };
				}
				Err(failed(OpusErrorCode::from_errno(status)))
			}
		}
	}

	pub fn abi(&self) -> &'static dyn OpusAbi {
		self.abi
	}

	/// The instance pointer, valid until the next [`NativeHandle::dispose`].
	pub fn live(&self) -> Result<*mut D::State> {
		self.state
			.map(NonNull::as_ptr)
			.ok_or(Error::UseAfterDispose(D::KIND))
	}

	/// Destroys the native instance. Returns whether this call did so.
	pub fn dispose(&mut self) -> bool {
		match self.state.take() {
			Some(state) => {
				// SAFETY: the pointer was taken out of the handle, so this is
				// the only destroy it will ever see.
				unsafe { D::destroy(self.abi, state.as_ptr()) };
				tracing::debug!(direction = %D::KIND, "disposed opus instance");
				true
			}
			None => false,
		}
	}

	pub fn is_disposed(&self) -> bool {
		self.state.is_none()
	}
}

impl<D: Direction> Drop for NativeHandle<D> {
	fn drop(&mut self) {
		self.dispose();
	}
}
