// SPDX-License-Identifier: MPL-2.0
use anyhow::{anyhow, Result};
use earshot_opus::{Channels, OpusDecoder, OpusEncoder, SampleRate};
use std::{borrow::Cow, f32::consts::TAU, thread};

/// How many encoded packets may queue up between the two threads.
const PACKET_BACKLOG: usize = 16;

pub struct Summary {
	pub packets: usize,
	pub packet_bytes: usize,
	pub decoded: Vec<i16>,
}

impl Summary {
	pub fn peak(&self) -> i16 {
		self.decoded
			.iter()
			.map(|s| s.saturating_abs())
			.max()
			.unwrap_or(0)
	}
}

/// Splits interleaved PCM into frames of `frame_len` samples, padding the last
/// one with silence.
pub fn frames(pcm: &[i16], frame_len: usize) -> impl Iterator<Item = Cow<'_, [i16]>> {
	pcm.chunks(frame_len).map(move |chunk| {
		if chunk.len() == frame_len {
			Cow::Borrowed(chunk)
		} else {
			let mut padded = chunk.to_vec();
			padded.resize(frame_len, 0);
			Cow::Owned(padded)
		}
	})
}

pub fn sine(rate: SampleRate, channels: Channels, frequency: f32, seconds: f32) -> Vec<i16> {
	let frames = (rate.hz() as f32 * seconds) as usize;
	(0..frames)
		.flat_map(|i| {
			let t = i as f32 / rate.hz() as f32;
			let sample = ((TAU * frequency * t).sin() * 12_000.0) as i16;
			std::iter::repeat(sample).take(channels.count())
		})
		.collect()
}

/// Encodes `pcm` on one thread and decodes the packets on another, handing
/// them over through a bounded channel.
pub fn run(
	mut encoder: OpusEncoder,
	mut decoder: OpusDecoder,
	pcm: Vec<i16>,
	frame_size: usize,
) -> Result<Summary> {
	let (packet_tx, packet_rx) = crossbeam_channel::bounded::<Vec<u8>>(PACKET_BACKLOG);
	let (pcm_tx, pcm_rx) = crossbeam_channel::unbounded::<Vec<i16>>();

	let frame_len = frame_size * encoder.channels().count();
	let encoding = thread::spawn(move || -> Result<(usize, usize)> {
		let mut packets = 0;
		let mut bytes = 0;
		for frame in frames(&pcm, frame_len) {
			let packet = encoder.encode(frame.as_ref(), frame_size)?;
			packets += 1;
			bytes += packet.len();
			tracing::trace!(packet = packets, bytes = packet.len(), "encoded");
			packet_tx.send(packet)?;
		}
		Ok((packets, bytes))
	});
	let decoding = thread::spawn(move || -> Result<()> {
		for packet in packet_rx {
			pcm_tx.send(decoder.decode_samples(&packet, frame_size)?)?;
		}
		Ok(())
	});

	// either thread stopping early drops its end of the pipe, which ends this
	let decoded: Vec<i16> = pcm_rx.iter().flatten().collect();

	// a decode failure surfaces in the encoder as a closed channel, so report it first
	join("decoder", decoding)?;
	let (packets, packet_bytes) = join("encoder", encoding)?;
	Ok(Summary {
		packets,
		packet_bytes,
		decoded,
	})
}

fn join<T>(name: &str, handle: thread::JoinHandle<Result<T>>) -> Result<T> {
	handle
		.join()
		.map_err(|_| anyhow!("{name} thread panicked"))?
}
