//! Transport control over a single output node.
//!
//! Output nodes play once and cannot be paused, so the controller keeps
//! the decoded buffer around and spins up a fresh node whenever playback
//! continues. Elapsed time is bookkept from [`Clock`] timestamps rather
//! than asked of the platform.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flux_core::{Error, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::backend::{AudioBackend, DecodedAudio, EndedNotifier, NodeEnded, NodeId, NodeSpec, OutputNode};
use crate::clock::Clock;

/// Transport state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Owns at most one live output node plus the buffer it plays.
pub struct OutputController {
    backend: Arc<dyn AudioBackend>,
    clock: Arc<dyn Clock>,
    ended_tx: UnboundedSender<NodeEnded>,
    state: OutputState,
    /// Clock reading when the current node started.
    started_at: Duration,
    audio: Option<Arc<DecodedAudio>>,
    node: Option<Box<dyn OutputNode>>,
    /// Seconds played before the current node started.
    accumulated: f64,
    volume: u8,
    next_node: NodeId,
}

impl OutputController {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        clock: Arc<dyn Clock>,
        ended_tx: UnboundedSender<NodeEnded>,
    ) -> Self {
        Self {
            backend,
            clock,
            ended_tx,
            state: OutputState::Idle,
            started_at: Duration::ZERO,
            audio: None,
            node: None,
            accumulated: 0.0,
            volume: 100,
            next_node: 1,
        }
    }

    /// Decode `data` without touching the controller.
    ///
    /// The returned future owns everything it needs, so callers can drop
    /// whatever lock guards the controller before awaiting it.
    pub fn decode(&self, data: Bytes) -> impl Future<Output = Result<DecodedAudio>> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        async move { backend.decode(data).await }
    }

    /// Decode and start playing from the beginning.
    pub async fn start(&mut self, data: Bytes) -> Result<()> {
        if self.state != OutputState::Idle {
            warn!("Start requested while output is {:?}", self.state);
            return Err(Error::AlreadyStarted);
        }
        let audio = self.decode(data).await?;
        self.start_decoded(audio)
    }

    /// Start playing an already decoded buffer from the beginning.
    pub fn start_decoded(&mut self, audio: DecodedAudio) -> Result<()> {
        if self.state != OutputState::Idle {
            warn!("Start requested while output is {:?}", self.state);
            return Err(Error::AlreadyStarted);
        }

        self.release_node();
        let audio = Arc::new(audio);
        self.spawn_node(Arc::clone(&audio), 0.0)?;

        debug!("Output started ({:.2}s buffer)", audio.duration());
        self.audio = Some(audio);
        self.accumulated = 0.0;
        self.started_at = self.clock.now();
        self.state = OutputState::Running;
        Ok(())
    }

    /// Freeze elapsed time and release the node.
    pub fn pause(&mut self) {
        if self.state != OutputState::Running {
            return;
        }
        self.accumulated += self.since_start();
        self.release_node();
        self.state = OutputState::Paused;
        debug!("Output paused at {:.2}s", self.accumulated);
    }

    /// Continue from the paused position, or from `from_offset` when it lies
    /// inside the track. On error the controller stays paused.
    pub fn resume(&mut self, from_offset: Option<f64>) -> Result<()> {
        if self.state != OutputState::Paused {
            return Ok(());
        }
        let Some(audio) = self.audio.clone() else {
            return Ok(());
        };

        if let Some(offset) = from_offset {
            if self.in_range(offset) {
                self.accumulated = offset;
            } else {
                debug!("Ignoring out-of-range resume offset {offset}");
            }
        }

        self.spawn_node(audio, self.accumulated)?;
        self.started_at = self.clock.now();
        self.state = OutputState::Running;
        debug!("Output resumed at {:.2}s", self.accumulated);
        Ok(())
    }

    /// Move the paused position. Returns whether the offset was accepted.
    pub fn reposition(&mut self, offset: f64) -> bool {
        if self.state != OutputState::Paused || !self.in_range(offset) {
            return false;
        }
        self.accumulated = offset;
        true
    }

    /// Play the loaded buffer again from the beginning.
    pub fn restart(&mut self) -> Result<()> {
        if self.state == OutputState::Idle {
            return Ok(());
        }
        let Some(audio) = self.audio.clone() else {
            return Ok(());
        };

        self.release_node();
        self.accumulated = 0.0;
        // Paused at 0 if the new node cannot be created.
        self.state = OutputState::Paused;
        self.spawn_node(audio, 0.0)?;
        self.started_at = self.clock.now();
        self.state = OutputState::Running;
        Ok(())
    }

    /// Release the node and the buffer.
    pub fn stop(&mut self) {
        self.release_node();
        self.audio = None;
        self.accumulated = 0.0;
        self.state = OutputState::Idle;
    }

    /// Set the volume in percent. Values above 100 are ignored.
    pub fn set_volume(&mut self, volume: u8) {
        if volume > 100 {
            debug!("Ignoring out-of-range volume {volume}");
            return;
        }
        self.volume = volume;
        let gain = self.gain();
        if let Some(node) = self.node.as_mut() {
            node.set_volume(gain);
        }
    }

    pub const fn volume(&self) -> u8 {
        self.volume
    }

    pub const fn state(&self) -> OutputState {
        self.state
    }

    /// Seconds of the current buffer played so far.
    pub fn elapsed(&self) -> f64 {
        match self.state {
            OutputState::Running => self.accumulated + self.since_start(),
            OutputState::Paused | OutputState::Idle => self.accumulated,
        }
    }

    /// Length of the loaded buffer, 0 if none.
    pub fn current_duration(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, |audio| audio.duration())
    }

    /// Whether `offset` is a valid position in the loaded buffer.
    pub fn in_range(&self, offset: f64) -> bool {
        offset.is_finite() && offset >= 0.0 && offset < self.current_duration()
    }

    /// Whether `node` is the node currently playing.
    pub fn is_live(&self, node: NodeId) -> bool {
        self.node.as_ref().is_some_and(|n| n.id() == node)
    }

    fn since_start(&self) -> f64 {
        self.clock.now().saturating_sub(self.started_at).as_secs_f64()
    }

    fn gain(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    fn spawn_node(&mut self, audio: Arc<DecodedAudio>, offset: f64) -> Result<()> {
        let id = self.next_node;
        self.next_node += 1;

        let spec = NodeSpec {
            id,
            offset,
            volume: self.gain(),
        };
        let ended = EndedNotifier::new(id, self.ended_tx.clone());
        self.node = Some(self.backend.create_node(audio, spec, ended)?);
        Ok(())
    }

    fn release_node(&mut self) {
        if let Some(mut node) = self.node.take() {
            node.stop();
        }
    }
}

impl Drop for OutputController {
    fn drop(&mut self) {
        self.release_node();
    }
}
