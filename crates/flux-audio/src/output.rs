//! Audio output using cpal.
//!
//! Each output node owns a cpal stream playing one decoded buffer. Streams
//! are not `Send`, so every node builds and holds its stream on a dedicated
//! thread; the [`CpalNode`] handle only carries the channel that tells that
//! thread to shut down.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use bytes::Bytes;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, Stream, StreamConfig,
};
use crossbeam_channel::{bounded, Sender};
use flux_core::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::backend::{AudioBackend, DecodedAudio, EndedNotifier, NodeId, NodeSpec, OutputNode};
use crate::{decode, resample};

/// Backend playing through the default cpal output device.
#[derive(Debug, Clone)]
pub struct CpalBackend {
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalBackend {
    /// Probe the default output device.
    pub fn new() -> Result<Self> {
        let device = default_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?;

        info!(
            "Using audio output device: {device_name} ({} Hz, {} channels)",
            config.sample_rate().0,
            config.channels()
        );

        Ok(Self {
            device_name,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Device sample rate; decoded audio is resampled to this.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }
}

#[async_trait]
impl AudioBackend for CpalBackend {
    async fn decode(&self, data: Bytes) -> Result<DecodedAudio> {
        let rate = self.sample_rate;
        tokio::task::spawn_blocking(move || {
            let audio = decode::decode_all(data)?;
            resample::resample(audio, rate)
        })
        .await
        .map_err(|e| Error::Internal(format!("Decode task failed: {e}")))?
    }

    fn create_node(
        &self,
        audio: Arc<DecodedAudio>,
        spec: NodeSpec,
        ended: EndedNotifier,
    ) -> Result<Box<dyn OutputNode>> {
        Ok(Box::new(CpalNode::spawn(audio, spec, ended)?))
    }
}

/// Handle to a stream running on its own thread.
pub struct CpalNode {
    id: NodeId,
    volume: Arc<Mutex<f32>>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalNode {
    fn spawn(audio: Arc<DecodedAudio>, spec: NodeSpec, ended: EndedNotifier) -> Result<Self> {
        let volume = Arc::new(Mutex::new(spec.volume));
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let thread_volume = Arc::clone(&volume);
        let thread = std::thread::Builder::new()
            .name(format!("audio-node-{}", spec.id))
            .spawn(move || {
                let playhead = Playhead {
                    frame: audio.frame_at(spec.offset),
                    audio,
                    volume: thread_volume,
                    ended: ended.clone(),
                    out_channels: 1,
                };
                let stream = match open_stream(playhead) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Blocks until the node is stopped or its handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                ended.notify();
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(node = spec.id, offset = spec.offset, "Output node started");
                Ok(Self {
                    id: spec.id,
                    volume,
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::AudioOutput(
                "Output thread exited before starting".to_string(),
            )),
        }
    }
}

impl OutputNode for CpalNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn set_volume(&mut self, volume: f32) {
        *self.volume.lock() = volume;
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        // Joining guarantees the stream is gone before a new one is built.
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(node = self.id, "Output thread panicked");
            }
            debug!(node = self.id, "Output node stopped");
        }
    }
}

impl Drop for CpalNode {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read position of a node inside its decoded buffer.
struct Playhead {
    audio: Arc<DecodedAudio>,
    frame: usize,
    volume: Arc<Mutex<f32>>,
    ended: EndedNotifier,
    out_channels: usize,
}

impl Playhead {
    fn fill<T: cpal::SizedSample + cpal::FromSample<f32>>(&mut self, data: &mut [T]) {
        let gain = *self.volume.lock();
        let in_channels = usize::from(self.audio.channels());
        let total = self.audio.frames();
        let samples = self.audio.samples();

        for frame in data.chunks_mut(self.out_channels) {
            if self.frame >= total {
                frame.fill(T::from_sample(0.0f32));
                continue;
            }

            let base = self.frame * in_channels;
            for (ch, out) in frame.iter_mut().enumerate() {
                // Extra device channels repeat the last source channel.
                let sample = samples[base + ch.min(in_channels - 1)] * gain;
                *out = T::from_sample(sample);
            }
            self.frame += 1;
        }

        if self.frame >= total {
            self.ended.notify();
        }
    }
}

fn default_device() -> Result<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No output device found".to_string()))
}

fn open_stream(mut playhead: Playhead) -> Result<Stream> {
    let device = default_device()?;
    let supported_config = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?;

    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();
    playhead.out_channels = usize::from(config.channels);

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, playhead)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, playhead)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, playhead)?,
        _ => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {sample_format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {e}")))?;

    Ok(stream)
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mut playhead: Playhead,
) -> Result<Stream> {
    let err_fn = |err| {
        error!("Audio stream error: {err}");
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| playhead.fill(data),
            err_fn,
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}
