// SPDX-License-Identifier: MPL-2.0
//! Raw libopus ABI surface.
//!
//! Only the entry points the safe layer binds are declared here. They are
//! described twice: as function pointer types plus symbol names, for
//! resolving them out of a library at run time, and (with the `static`
//! feature) as `extern "C"` items linked against the bundled libopus.
#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_uchar};

pub type opus_int16 = i16;
pub type opus_int32 = i32;

/// Opaque encoder state owned by libopus.
#[repr(C)]
pub struct OpusEncoder {
	_private: [u8; 0],
}

/// Opaque decoder state owned by libopus.
#[repr(C)]
pub struct OpusDecoder {
	_private: [u8; 0],
}

pub const OPUS_OK: c_int = 0;
pub const OPUS_BAD_ARG: c_int = -1;
pub const OPUS_BUFFER_TOO_SMALL: c_int = -2;
pub const OPUS_INTERNAL_ERROR: c_int = -3;
pub const OPUS_INVALID_PACKET: c_int = -4;
pub const OPUS_UNIMPLEMENTED: c_int = -5;
pub const OPUS_INVALID_STATE: c_int = -6;
pub const OPUS_ALLOC_FAIL: c_int = -7;

pub const OPUS_APPLICATION_VOIP: c_int = 2048;
pub const OPUS_APPLICATION_AUDIO: c_int = 2049;
pub const OPUS_APPLICATION_RESTRICTED_LOWDELAY: c_int = 2051;

pub const OPUS_AUTO: c_int = -1000;
pub const OPUS_BITRATE_MAX: c_int = -1;

pub const OPUS_SET_BITRATE_REQUEST: c_int = 4002;
pub const OPUS_GET_BITRATE_REQUEST: c_int = 4003;
pub const OPUS_SET_VBR_REQUEST: c_int = 4006;
pub const OPUS_SET_COMPLEXITY_REQUEST: c_int = 4010;
pub const OPUS_GET_COMPLEXITY_REQUEST: c_int = 4011;
pub const OPUS_SET_INBAND_FEC_REQUEST: c_int = 4012;
pub const OPUS_SET_PACKET_LOSS_PERC_REQUEST: c_int = 4014;
pub const OPUS_GET_PACKET_LOSS_PERC_REQUEST: c_int = 4015;
pub const OPUS_SET_DTX_REQUEST: c_int = 4016;
pub const OPUS_RESET_STATE: c_int = 4028;
pub const OPUS_GET_SAMPLE_RATE_REQUEST: c_int = 4029;
pub const OPUS_SET_GAIN_REQUEST: c_int = 4034;
pub const OPUS_GET_LAST_PACKET_DURATION_REQUEST: c_int = 4039;

pub type opus_encoder_create_fn = unsafe extern "C" fn(
	fs: opus_int32,
	channels: c_int,
	application: c_int,
	error: *mut c_int,
) -> *mut OpusEncoder;
pub type opus_encode_fn = unsafe extern "C" fn(
	st: *mut OpusEncoder,
	pcm: *const opus_int16,
	frame_size: c_int,
	data: *mut c_uchar,
	max_data_bytes: opus_int32,
) -> opus_int32;
pub type opus_encoder_destroy_fn = unsafe extern "C" fn(st: *mut OpusEncoder);
pub type opus_encoder_ctl_fn =
	unsafe extern "C" fn(st: *mut OpusEncoder, request: c_int, ...) -> c_int;

pub type opus_decoder_create_fn =
	unsafe extern "C" fn(fs: opus_int32, channels: c_int, error: *mut c_int) -> *mut OpusDecoder;
pub type opus_decode_fn = unsafe extern "C" fn(
	st: *mut OpusDecoder,
	data: *const c_uchar,
	len: opus_int32,
	pcm: *mut opus_int16,
	frame_size: c_int,
	decode_fec: c_int,
) -> c_int;
pub type opus_decoder_destroy_fn = unsafe extern "C" fn(st: *mut OpusDecoder);
pub type opus_decoder_ctl_fn =
	unsafe extern "C" fn(st: *mut OpusDecoder, request: c_int, ...) -> c_int;

pub type opus_get_version_string_fn = unsafe extern "C" fn() -> *const c_char;

/// NUL-terminated symbol names, as looked up in a loaded library.
pub mod symbols {
	pub const OPUS_ENCODER_CREATE: &[u8] = b"opus_encoder_create\0";
	pub const OPUS_ENCODE: &[u8] = b"opus_encode\0";
	pub const OPUS_ENCODER_DESTROY: &[u8] = b"opus_encoder_destroy\0";
	pub const OPUS_ENCODER_CTL: &[u8] = b"opus_encoder_ctl\0";
	pub const OPUS_DECODER_CREATE: &[u8] = b"opus_decoder_create\0";
	pub const OPUS_DECODE: &[u8] = b"opus_decode\0";
	pub const OPUS_DECODER_DESTROY: &[u8] = b"opus_decoder_destroy\0";
	pub const OPUS_DECODER_CTL: &[u8] = b"opus_decoder_ctl\0";
	pub const OPUS_GET_VERSION_STRING: &[u8] = b"opus_get_version_string\0";
}

/// Entry points of the libopus linked into this binary by the `static`
/// feature.
#[cfg(feature = "static")]
pub mod linked {
	use super::*;

	extern "C" {
		pub fn opus_encoder_create(
			fs: opus_int32,
			channels: c_int,
			application: c_int,
			error: *mut c_int,
		) -> *mut OpusEncoder;
		pub fn opus_encode(
			st: *mut OpusEncoder,
			pcm: *const opus_int16,
			frame_size: c_int,
			data: *mut c_uchar,
			max_data_bytes: opus_int32,
		) -> opus_int32;
		pub fn opus_encoder_destroy(st: *mut OpusEncoder);
		pub fn opus_encoder_ctl(st: *mut OpusEncoder, request: c_int, ...) -> c_int;
		pub fn opus_decoder_create(
			fs: opus_int32,
			channels: c_int,
			error: *mut c_int,
		) -> *mut OpusDecoder;
		pub fn opus_decode(
			st: *mut OpusDecoder,
			data: *const c_uchar,
			len: opus_int32,
			pcm: *mut opus_int16,
			frame_size: c_int,
			decode_fec: c_int,
		) -> c_int;
		pub fn opus_decoder_destroy(st: *mut OpusDecoder);
		pub fn opus_decoder_ctl(st: *mut OpusDecoder, request: c_int, ...) -> c_int;
		pub fn opus_get_version_string() -> *const c_char;
	}
}
