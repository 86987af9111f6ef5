// SPDX-License-Identifier: MPL-2.0

mod encodable;
mod encoder;

pub use self::{
	encodable::OpusEncodable,
	encoder::{OpusEncoder, MAX_PACKET_BYTES},
};
