// SPDX-License-Identifier: MPL-2.0
use anyhow::Result;
use earshot_opus::SampleRate;
use rubato::{
	Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_FRAMES: usize = 1024;

/// Brings interleaved PCM at `from_rate` to a rate Opus accepts. Supported
/// rates pass through untouched; anything else is resampled to 48 kHz.
pub fn to_opus_rate(
	pcm: &[i16],
	channels: usize,
	from_rate: u32,
) -> Result<(Vec<i16>, SampleRate)> {
	if let Ok(rate) = SampleRate::try_from(from_rate) {
		return Ok((pcm.to_vec(), rate));
	}
	let target = SampleRate::Hz48000;
	tracing::info!(from = from_rate, to = target.hz(), "resampling input");
	let ratio = target.hz() as f64 / from_rate as f64;

	let params = SincInterpolationParameters {
		sinc_len: 256,
		f_cutoff: 0.95,
		interpolation: SincInterpolationType::Linear,
		oversampling_factor: 256,
		window: WindowFunction::BlackmanHarris2,
	};
	let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)?;

	let planar = deinterleave(pcm, channels);
	let input_frames = planar.first().map_or(0, Vec::len);
	let expected = (input_frames as f64 * ratio).round() as usize;
	let delay = resampler.output_delay();
	let mut output = vec![Vec::with_capacity(expected + delay); channels];

	let mut position = 0;
	while position < input_frames {
		let needed = resampler.input_frames_next();
		let end = (position + needed).min(input_frames);
		let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[position..end]).collect();
		let processed = if end - position == needed {
			resampler.process(chunk.as_slice(), None)?
		} else {
			resampler.process_partial(Some(chunk.as_slice()), None)?
		};
		append(&mut output, processed);
		position = end;
	}
	// flush whatever the filter still holds
	while output[0].len() < expected + delay {
		let processed = resampler.process_partial(None::<&[&[f32]]>, None)?;
		if processed[0].is_empty() {
			break;
		}
		append(&mut output, processed);
	}

	Ok((interleave(&output, delay, expected), target))
}

fn deinterleave(pcm: &[i16], channels: usize) -> Vec<Vec<f32>> {
	let mut planar = vec![Vec::with_capacity(pcm.len() / channels); channels];
	for frame in pcm.chunks_exact(channels) {
		for (channel, sample) in planar.iter_mut().zip(frame) {
			channel.push(*sample as f32 / 32768.0);
		}
	}
	planar
}

fn append(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
	for (channel, samples) in output.iter_mut().zip(processed) {
		channel.extend(samples);
	}
}

fn interleave(planar: &[Vec<f32>], skip: usize, frames: usize) -> Vec<i16> {
	let available = planar[0].len().saturating_sub(skip).min(frames);
	let mut pcm = Vec::with_capacity(available * planar.len());
	for i in skip..skip + available {
		for channel in planar {
			pcm.push((channel[i] * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16);
		}
	}
	pcm
}
