// SPDX-License-Identifier: MPL-2.0
mod loopback;
mod packets;
mod resample;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use earshot_opus::{
	buffer::{le_bytes_to_samples, samples_to_le_bytes},
	library, Channels, LocatorConfig, OpusApplication, OpusDecoder, OpusEncoder, SampleRate,
};
use std::{
	fs::{self, File},
	io::{BufReader, BufWriter, Write},
	path::{Path, PathBuf},
};
use tracing_subscriber::EnvFilter;

/// Encode and decode Opus through the system libopus.
#[derive(Parser)]
#[command(name = "earshot", version)]
struct Cli {
	/// libopus shared library to load instead of searching the platform
	/// defaults (also read from EARSHOT_OPUS_LIBRARY)
	#[arg(long, global = true)]
	library: Option<PathBuf>,

	/// Log codec lifecycle events
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Print the libopus version string
	Version,
	/// Encode raw s16le PCM into a packet stream
	Encode {
		#[arg(short, long)]
		input: PathBuf,
		#[arg(short, long)]
		output: PathBuf,
		#[command(flatten)]
		stream: StreamArgs,
		#[command(flatten)]
		tuning: EncoderArgs,
	},
	/// Decode a packet stream into raw s16le PCM
	Decode {
		#[arg(short, long)]
		input: PathBuf,
		#[arg(short, long)]
		output: PathBuf,
		/// Sample rate the stream was encoded at, as `encode` reported it
		#[arg(long, default_value_t = 48_000)]
		rate: u32,
		/// 1 or 2
		#[arg(long, default_value_t = 2)]
		channels: u16,
	},
	/// Push audio through an encoder thread and a decoder thread
	Loopback {
		/// Raw s16le PCM to use instead of a generated tone
		#[arg(short, long)]
		input: Option<PathBuf>,
		/// Where to write the decoded s16le PCM
		#[arg(short, long)]
		output: Option<PathBuf>,
		/// Length of the generated tone
		#[arg(long, default_value_t = 2.0)]
		seconds: f32,
		/// Pitch of the generated tone in Hz
		#[arg(long, default_value_t = 440.0)]
		frequency: f32,
		#[command(flatten)]
		stream: StreamArgs,
		#[command(flatten)]
		tuning: EncoderArgs,
	},
}

#[derive(Args, Clone, Copy)]
struct StreamArgs {
	/// Sample rate of the PCM in Hz
	#[arg(long, default_value_t = 48_000)]
	rate: u32,
	/// 1 or 2
	#[arg(long, default_value_t = 2)]
	channels: u16,
	/// Frame duration in milliseconds: 10, 20, 40 or 60
	#[arg(long, default_value_t = 20)]
	frame_ms: u32,
}

#[derive(Args, Clone, Copy)]
struct EncoderArgs {
	/// Target bitrate in bits per second
	#[arg(long)]
	bitrate: Option<i32>,
	/// 0 (fastest) to 10 (best)
	#[arg(long)]
	complexity: Option<i32>,
	/// Tune for speech instead of general audio
	#[arg(long)]
	voip: bool,
}

impl EncoderArgs {
	fn build(self, rate: SampleRate, channels: Channels) -> Result<OpusEncoder> {
		let application = if self.voip {
			OpusApplication::Voip
		} else {
			OpusApplication::Audio
		};
		let mut encoder = OpusEncoder::new(rate, channels, application)?;
		if let Some(bitrate) = self.bitrate {
			encoder.set_bitrate(bitrate)?;
		}
		if let Some(complexity) = self.complexity {
			encoder.set_complexity(complexity)?;
		}
		Ok(encoder)
	}
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	let config = match cli.library {
		Some(path) => LocatorConfig::default().with_library_path(path),
		None => LocatorConfig::from_env(),
	};
	library::resolve_with(&config).context("couldn't load libopus")?;

	match cli.command {
		Command::Version => println!("{}", earshot_opus::version()?),
		Command::Encode {
			input,
			output,
			stream,
			tuning,
		} => {
			let encoded = encode(&input, &output, stream, tuning)?;
			println!(
				"{} packets, {} bytes at {}",
				encoded.packets, encoded.bytes, encoded.rate
			);
			if i32::try_from(stream.rate).ok() != Some(encoded.rate.hz()) {
				println!(
					"input was resampled; decode with --rate {}",
					encoded.rate.hz()
				);
			}
		}
		Command::Decode {
			input,
			output,
			rate,
			channels,
		} => {
			let rate = SampleRate::try_from(rate)?;
			let channels = Channels::try_from(channels)?;
			let packets = decode(&input, &output, rate, channels)?;
			println!("{packets} packets decoded");
		}
		Command::Loopback {
			input,
			output,
			seconds,
			frequency,
			stream,
			tuning,
		} => {
			let channels = Channels::try_from(stream.channels)?;
			let (pcm, rate) = match input {
				Some(path) => read_pcm(&path, channels, stream.rate)?,
				None => {
					let rate = SampleRate::try_from(stream.rate)?;
					(loopback::sine(rate, channels, frequency, seconds), rate)
				}
			};
			let encoder = tuning.build(rate, channels)?;
			let decoder = OpusDecoder::new(rate, channels)?;
			let summary = loopback::run(encoder, decoder, pcm, rate.frame_size(stream.frame_ms))?;
			println!(
				"{} packets, {} bytes, peak amplitude {}",
				summary.packets,
				summary.packet_bytes,
				summary.peak()
			);
			if let Some(path) = output {
				fs::write(&path, samples_to_le_bytes(&summary.decoded))
					.with_context(|| format!("couldn't write {}", path.display()))?;
			}
		}
	}
	Ok(())
}

fn init_logging(verbose: bool) {
	let default = if verbose { "debug" } else { "info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

/// Reads raw PCM and brings it to a rate Opus accepts.
fn read_pcm(path: &Path, channels: Channels, rate: u32) -> Result<(Vec<i16>, SampleRate)> {
	let bytes = fs::read(path).with_context(|| format!("couldn't read {}", path.display()))?;
	let pcm = le_bytes_to_samples(&bytes)?;
	resample::to_opus_rate(&pcm, channels.count(), rate)
}

struct Encoded {
	packets: usize,
	bytes: usize,
	/// Rate of the stream, which differs from the input's when it was resampled.
	rate: SampleRate,
}

fn encode(
	input: &Path,
	output: &Path,
	stream: StreamArgs,
	tuning: EncoderArgs,
) -> Result<Encoded> {
	let channels = Channels::try_from(stream.channels)?;
	let (pcm, rate) = read_pcm(input, channels, stream.rate)?;
	let mut encoder = tuning.build(rate, channels)?;
	let frame_size = rate.frame_size(stream.frame_ms);

	let file =
		File::create(output).with_context(|| format!("couldn't create {}", output.display()))?;
	let mut out = BufWriter::new(file);
	let mut count = 0;
	let mut bytes = 0;
	for frame in loopback::frames(&pcm, frame_size * channels.count()) {
		let packet = encoder.encode(frame.as_ref(), frame_size)?;
		packets::write_packet(&mut out, &packet)?;
		count += 1;
		bytes += packet.len();
	}
	out.flush()?;
	tracing::info!(packets = count, bytes, rate = rate.hz(), "encoded");
	Ok(Encoded {
		packets: count,
		bytes,
		rate,
	})
}

/// The stream carries no frame duration, so every packet gets room for the
/// longest one Opus allows.
const DECODE_CAPACITY_MS: u32 = 120;

fn decode(input: &Path, output: &Path, rate: SampleRate, channels: Channels) -> Result<usize> {
	let mut decoder = OpusDecoder::new(rate, channels)?;
	let frame_size = rate.frame_size(DECODE_CAPACITY_MS);

	let file = File::open(input).with_context(|| format!("couldn't open {}", input.display()))?;
	let mut out = BufWriter::new(
		File::create(output).with_context(|| format!("couldn't create {}", output.display()))?,
	);
	let mut count = 0;
	for packet in packets::PacketReader::new(BufReader::new(file)) {
		let packet = packet.with_context(|| format!("corrupt packet stream {}", input.display()))?;
		out.write_all(&decoder.decode(&packet, frame_size)?)?;
		count += 1;
	}
	out.flush()?;
	tracing::info!(packets = count, "decoded");
	Ok(count)
}
