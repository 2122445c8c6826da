//! Audio decoding using symphonia.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::io::Cursor;

use bytes::Bytes;
use flux_core::{Error, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

use crate::backend::DecodedAudio;

/// Packet-by-packet decoder over an in-memory file.
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl AudioDecoder {
    /// Probe the container and open the first audio track.
    #[allow(clippy::needless_pass_by_value)] // Bytes is cheaply cloneable
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), MediaSourceStreamOptions::default());

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&Hint::new(), mss, &format_opts, &metadata_opts)
            .map_err(|e| Error::AudioDecode(format!("Failed to probe format: {e}")))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::AudioDecode("No audio tracks found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::AudioDecode("Unknown sample rate".to_string()))?;
        let channels = track.codec_params.channels.map_or(2, |c| c.count() as u16);

        debug!(track_id, sample_rate, channels, "Opened audio track");

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::AudioDecode(format!("Failed to create decoder: {e}")))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Decode the next packet into interleaved f32 samples.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn decode_next(&mut self) -> Result<Option<&[f32]>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Failed to read packet: {e}")));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let frames = decoded.capacity();
                    if self
                        .sample_buf
                        .as_ref()
                        .is_some_and(|b| b.capacity() < frames * spec.channels.count())
                    {
                        self.sample_buf = None;
                    }
                    let buf = self
                        .sample_buf
                        .get_or_insert_with(|| SampleBuffer::new(frames as u64, spec));
                    buf.copy_interleaved_ref(decoded);
                    return Ok(Some(buf.samples()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frames are skipped rather than failing the whole file.
                    warn!("Decode error (skipping): {e}");
                }
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Decode failed: {e}")));
                }
            }
        }
    }
}

/// Decode an entire file into memory.
pub fn decode_all(data: Bytes) -> Result<DecodedAudio> {
    let size = data.len();
    let mut decoder = AudioDecoder::from_bytes(data)?;
    let sample_rate = decoder.sample_rate();
    let channels = decoder.channels();

    let mut samples = Vec::new();
    while let Some(chunk) = decoder.decode_next()? {
        samples.extend_from_slice(chunk);
    }

    let audio = DecodedAudio::new(samples, sample_rate, channels)?;
    if audio.is_empty() {
        return Err(Error::AudioDecode("No audio frames decoded".to_string()));
    }

    debug!(
        "Decoded {size} bytes into {:.2}s of audio ({sample_rate} Hz, {channels} ch)",
        audio.duration()
    );
    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV file.
    fn wav_bytes(sample_rate: u32, channels: u16, frames: u32) -> Bytes {
        let block_align = channels * 2;
        let data_len = frames * u32::from(block_align);
        let mut out = Vec::with_capacity(44 + data_len as usize);

        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames * u32::from(channels) {
            let sample = ((i % 64) as i16 - 32) * 256;
            out.extend_from_slice(&sample.to_le_bytes());
        }

        Bytes::from(out)
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_decode_wav() {
        let audio = decode_all(wav_bytes(8000, 2, 8000)).unwrap();
        assert_eq!(audio.sample_rate(), 8000);
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.frames(), 8000);
        assert_eq!(audio.duration(), 1.0);
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let result = decode_all(Bytes::from_static(b"definitely not audio"));
        assert!(matches!(result, Err(Error::AudioDecode(_))));
    }

    #[test]
    fn test_empty_input_is_decode_failure() {
        assert!(matches!(decode_all(Bytes::new()), Err(Error::AudioDecode(_))));
    }
}
