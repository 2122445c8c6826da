//! Audio resampling using rubato.
//!
//! Tracks are decoded in full before playback, so resampling also happens
//! once per track: the whole buffer is converted to the device rate and
//! output nodes can then index it by frame directly.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use flux_core::{Error, Result};
use rubato::{FftFixedIn, Resampler as _};
use tracing::debug;

use crate::backend::DecodedAudio;

/// Frames fed to the resampler per call.
const CHUNK_FRAMES: usize = 1024;

/// Convert `audio` to `output_rate`. Returns the input unchanged when the
/// rates already match.
pub fn resample(audio: DecodedAudio, output_rate: u32) -> Result<DecodedAudio> {
    let input_rate = audio.sample_rate();
    if input_rate == output_rate || audio.is_empty() {
        return Ok(audio);
    }

    let channels = usize::from(audio.channels());
    let mut resampler = FftFixedIn::<f32>::new(
        input_rate as usize,
        output_rate as usize,
        CHUNK_FRAMES,
        2,
        channels,
    )
    .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {e}")))?;

    let planes = deinterleave(audio.samples(), channels);
    let expected_frames =
        (audio.frames() as f64 * f64::from(output_rate) / f64::from(input_rate)).round() as usize;
    let delay = resampler.output_delay();
    let wanted = expected_frames + delay;

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted); channels];
    let mut position = 0;

    // Keep feeding (zero-padded past the end) until the delayed tail is out.
    while output[0].len() < wanted {
        let chunk: Vec<Vec<f32>> = planes
            .iter()
            .map(|plane| {
                let start = position.min(plane.len());
                let end = (position + CHUNK_FRAMES).min(plane.len());
                let mut data = plane[start..end].to_vec();
                data.resize(CHUNK_FRAMES, 0.0);
                data
            })
            .collect();
        position += CHUNK_FRAMES;

        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| Error::AudioOutput(format!("Resample failed: {e}")))?;
        for (dst, src) in output.iter_mut().zip(resampled) {
            dst.extend(src);
        }
    }

    let mut samples = Vec::with_capacity(expected_frames * channels);
    for frame in delay..wanted {
        for plane in &output {
            samples.push(plane[frame]);
        }
    }

    debug!(
        "Resampled {} frames at {input_rate} Hz to {expected_frames} frames at {output_rate} Hz",
        audio.frames()
    );

    DecodedAudio::new(samples, output_rate, audio.channels())
}

/// Split interleaved samples into one buffer per channel.
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planes = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }
    planes
}
