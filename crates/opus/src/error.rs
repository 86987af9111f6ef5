// SPDX-License-Identifier: MPL-2.0
use earshot_opus_sys::{
	OPUS_ALLOC_FAIL, OPUS_BAD_ARG, OPUS_BUFFER_TOO_SMALL, OPUS_INTERNAL_ERROR,
	OPUS_INVALID_PACKET, OPUS_INVALID_STATE, OPUS_UNIMPLEMENTED,
};
use std::fmt::{Display, Error as FmtError, Formatter};

/// A failure category reported by libopus as a negative status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpusErrorCode {
	BadArg,
	BufferTooSmall,
	InternalError,
	InvalidPacket,
	Unimplemented,
	InvalidState,
	AllocFail,
	/// A negative code this binding doesn't know about; the raw value is kept.
	Unknown(i32),
}

impl OpusErrorCode {
	/// Maps a negative libopus status code to its category.
	pub fn from_errno(errno: i32) -> Self {
		match errno {
			OPUS_BAD_ARG => Self::BadArg,
			OPUS_BUFFER_TOO_SMALL => Self::BufferTooSmall,
			OPUS_INTERNAL_ERROR => Self::InternalError,
			OPUS_INVALID_PACKET => Self::InvalidPacket,
			OPUS_UNIMPLEMENTED => Self::Unimplemented,
			OPUS_INVALID_STATE => Self::InvalidState,
			OPUS_ALLOC_FAIL => Self::AllocFail,
			other => Self::Unknown(other),
		}
	}

	/// The raw status code, as libopus reported it.
	pub fn code(self) -> i32 {
		match self {
			Self::BadArg => OPUS_BAD_ARG,
			Self::BufferTooSmall => OPUS_BUFFER_TOO_SMALL,
			Self::InternalError => OPUS_INTERNAL_ERROR,
			Self::InvalidPacket => OPUS_INVALID_PACKET,
			Self::Unimplemented => OPUS_UNIMPLEMENTED,
			Self::InvalidState => OPUS_INVALID_STATE,
			Self::AllocFail => OPUS_ALLOC_FAIL,
			Self::Unknown(code) => code,
		}
	}

	/// Same text `opus_strerror` returns, without needing the library loaded.
	pub fn description(self) -> &'static str {
		match self {
			Self::BadArg => "invalid argument",
			Self::BufferTooSmall => "buffer too small",
			Self::InternalError => "internal error",
			Self::InvalidPacket => "corrupted stream",
			Self::Unimplemented => "request not implemented",
			Self::InvalidState => "invalid state",
			Self::AllocFail => "memory allocation failed",
			Self::Unknown(_) => "unknown error",
		}
	}
}

impl Display for OpusErrorCode {
	fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
		write!(f, "{} ({})", self.description(), self.code())
	}
}

impl std::error::Error for OpusErrorCode {}

#[macro_export]
macro_rules! map_error {
	($x:expr) => {{
		let result = $x;
		match result {
			..0 => Err($crate::error::OpusErrorCode::from_errno(result)),
			0.. => Ok(result),
		}
	}};
	(&$var:ident, $x:expr) => {{
		map_error!($x).map(|_| $var)
	}};
	((), $x:expr) => {{
		map_error!($x).map(|_| ())
	}};
	($return_type:ty, $x:expr) => {
		map_error!($x).map(|value| value as $return_type)
	};
}

/// Splits a libopus return value into a non-negative result or an error.
///
/// Zero is success and is never turned into an error.
pub fn map_status(status: i32) -> Result<u32, OpusErrorCode> {
	map_error!(u32, status)
}

/// Which side of the codec an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
	Encoder,
	Decoder,
}

impl Display for CodecKind {
	fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
		f.write_str(match self {
			Self::Encoder => "encoder",
			Self::Decoder => "decoder",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("no way to bind libopus on platform `{0}`")]
	UnsupportedPlatform(&'static str),
	#[error("failed to resolve libopus from {library}: {reason}")]
	LibraryResolutionFailed { library: String, reason: String },
	#[error("unsupported sample rate {0} Hz (expected 8000, 12000, 16000, 24000 or 48000)")]
	InvalidSampleRate(i32),
	#[error("sample rate {0} Hz is far beyond anything libopus accepts")]
	SampleRateOutOfRange(u32),
	#[error("unsupported channel count {0} (expected 1 or 2)")]
	InvalidChannels(i32),
	#[error("complexity {0} is outside of 0-10")]
	InvalidComplexity(i32),
	#[error("frame size of {0} samples per channel is out of range")]
	InvalidFrameSize(usize),
	#[error("expected {expected} interleaved pcm samples, got {actual}")]
	PcmLengthMismatch { expected: usize, actual: usize },
	#[error("pcm byte buffer has odd length {0}")]
	OddPcmByteLength(usize),
	#[error("buffer of {0} elements is too large to hand to libopus")]
	BufferTooLarge(usize),
	#[error("failed to create opus {direction}: {code}")]
	CreateFailed {
		direction: CodecKind,
		code: OpusErrorCode,
	},
	#[error("opus {0} used after being disposed")]
	UseAfterDispose(CodecKind),
	#[error("opus {direction} transform failed: {code}")]
	TransformFailed {
		direction: CodecKind,
		code: OpusErrorCode,
	},
	#[error("opus {direction} ctl request {request} failed: {code}")]
	ControlFailed {
		direction: CodecKind,
		request: i32,
		code: OpusErrorCode,
	},
}

impl Error {
	/// The native status code behind this error, if it came from libopus.
	pub fn native_code(&self) -> Option<OpusErrorCode> {
		match self {
			Self::CreateFailed { code, .. }
			| Self::TransformFailed { code, .. }
			| Self::ControlFailed { code, .. } => Some(*code),
			_ => None,
		}
	}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
