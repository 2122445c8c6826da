//! Platform audio primitives the output controller is built on.
//!
//! A backend decodes raw file bytes into PCM and creates output nodes.
//! An output node plays one decoded buffer from a given offset until it
//! runs out or is stopped; it cannot be restarted. This mirrors how
//! buffer-source nodes work on most platforms and is why pausing is
//! implemented as "stop and remember where we were".

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use flux_core::{Error, Result};
use tokio::sync::mpsc::UnboundedSender;

/// Identifier of an output node, unique per output controller.
pub type NodeId = u64;

/// Raised once per node when it stops producing sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEnded {
    pub node: NodeId,
}

/// Fully decoded, interleaved f32 PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(Error::AudioDecode(format!(
                "Invalid stream layout: {sample_rate} Hz, {channels} channels"
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Frame index for a position in seconds, clamped to the buffer.
    pub fn frame_at(&self, seconds: f64) -> usize {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        ((seconds * f64::from(self.sample_rate)) as usize).min(self.frames())
    }
}

/// Parameters for a new output node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    /// Position in seconds to start playing from.
    pub offset: f64,
    /// Linear gain, 0.0 to 1.0.
    pub volume: f32,
}

/// Reports the end of one output node.
///
/// Backends call [`EndedNotifier::notify`] when the node runs out of audio
/// and again when it is stopped; only the first call is delivered.
#[derive(Debug, Clone)]
pub struct EndedNotifier {
    node: NodeId,
    tx: UnboundedSender<NodeEnded>,
    fired: Arc<AtomicBool>,
}

impl EndedNotifier {
    pub(crate) fn new(node: NodeId, tx: UnboundedSender<NodeEnded>) -> Self {
        Self {
            node,
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Safe to call from a real-time audio callback: never blocks.
    pub fn notify(&self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            // The receiver is gone only once the player itself is dropped.
            let _ = self.tx.send(NodeEnded { node: self.node });
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// A live output node. Dropping a node must stop it.
pub trait OutputNode: Send {
    fn id(&self) -> NodeId;

    /// Change the gain of the running node.
    fn set_volume(&mut self, volume: f32);

    /// Stop output and release the platform resource. Idempotent.
    fn stop(&mut self);
}

/// Decoder plus output-node factory.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Decode a complete audio file.
    async fn decode(&self, data: Bytes) -> Result<DecodedAudio>;

    /// Create a node that immediately starts playing `audio` at `spec.offset`.
    fn create_node(
        &self,
        audio: Arc<DecodedAudio>,
        spec: NodeSpec,
        ended: EndedNotifier,
    ) -> Result<Box<dyn OutputNode>>;
}
