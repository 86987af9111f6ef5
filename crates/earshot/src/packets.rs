// SPDX-License-Identifier: MPL-2.0
//! Packet stream files: each packet is stored as a little-endian `u16`
//! length followed by that many bytes.
use std::io::{self, ErrorKind, Read, Write};

pub fn write_packet<W: Write>(out: &mut W, packet: &[u8]) -> io::Result<()> {
	let len = u16::try_from(packet.len()).map_err(|_| {
		io::Error::new(
			ErrorKind::InvalidInput,
			format!("{} byte packet does not fit a u16 length", packet.len()),
		)
	})?;
	out.write_all(&len.to_le_bytes())?;
	out.write_all(packet)
}

/// Iterates over the packets of a stream. A stream that ends in the middle
/// of a packet yields an [`ErrorKind::UnexpectedEof`] error.
pub struct PacketReader<R> {
	inner: R,
}

impl<R: Read> PacketReader<R> {
	pub fn new(inner: R) -> Self {
		Self { inner }
	}

	fn next_packet(&mut self) -> io::Result<Option<Vec<u8>>> {
		let mut len = [0u8; 2];
		loop {
			match self.inner.read(&mut len[..1]) {
				Ok(0) => return Ok(None),
				Ok(_) => break,
				Err(err) if err.kind() == ErrorKind::Interrupted => continue,
				Err(err) => return Err(err),
			}
		}
		self.inner.read_exact(&mut len[1..])?;
		let mut packet = vec![0; u16::from_le_bytes(len) as usize];
		self.inner.read_exact(&mut packet)?;
		Ok(Some(packet))
	}
}

impl<R: Read> Iterator for PacketReader<R> {
	type Item = io::Result<Vec<u8>>;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_packet().transpose()
	}
}
