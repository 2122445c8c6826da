//! Test doubles for the playback engine.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use flux_core::{Error, EventSink, PlayerEvent, Result, Track};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::backend::{AudioBackend, DecodedAudio, EndedNotifier, NodeId, NodeSpec, OutputNode};
use crate::source::ByteProvider;

/// Sample rate of the audio produced by [`MockBackend`].
const MOCK_RATE: u32 = 100;

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Something the mock backend was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Decode,
    Create { node: NodeId, offset: f64 },
    Stop(NodeId),
}

#[derive(Default)]
struct MockState {
    journal: Vec<Call>,
    live: HashMap<NodeId, EndedNotifier>,
    volumes: HashMap<NodeId, f32>,
    max_live: usize,
    fail_next_create: bool,
}

/// Backend that "decodes" `dur:<seconds>` into silence and records calls.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Vec<Call> {
        self.state.lock().journal.clone()
    }

    pub fn decode_count(&self) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|c| **c == Call::Decode)
            .count()
    }

    /// Offsets of every node created, in order.
    pub fn created(&self) -> Vec<(NodeId, f64)> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|c| match c {
                Call::Create { node, offset } => Some((*node, *offset)),
                _ => None,
            })
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn max_live(&self) -> usize {
        self.state.lock().max_live
    }

    pub fn node_volume(&self, node: NodeId) -> Option<f32> {
        self.state.lock().volumes.get(&node).copied()
    }

    pub fn fail_next_create(&self) {
        self.state.lock().fail_next_create = true;
    }

    /// Make every live node run out of audio. Returns their ids.
    pub fn finish_live(&self) -> Vec<NodeId> {
        let state = self.state.lock();
        let mut ids: Vec<NodeId> = state.live.keys().copied().collect();
        ids.sort_unstable();
        for id in &ids {
            state.live[id].notify();
        }
        ids
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn decode(&self, data: Bytes) -> Result<DecodedAudio> {
        self.state.lock().journal.push(Call::Decode);

        let seconds = std::str::from_utf8(&data)
            .ok()
            .and_then(|s| s.strip_prefix("dur:"))
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| Error::AudioDecode("Unrecognized mock audio".to_string()))?;

        let frames = (seconds * f64::from(MOCK_RATE)) as usize;
        DecodedAudio::new(vec![0.0; frames], MOCK_RATE, 1)
    }

    fn create_node(
        &self,
        _audio: Arc<DecodedAudio>,
        spec: NodeSpec,
        ended: EndedNotifier,
    ) -> Result<Box<dyn OutputNode>> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_create) {
            return Err(Error::AudioOutput("Mock node failure".to_string()));
        }

        state.journal.push(Call::Create {
            node: spec.id,
            offset: spec.offset,
        });
        state.live.insert(spec.id, ended.clone());
        state.volumes.insert(spec.id, spec.volume);
        state.max_live = state.max_live.max(state.live.len());

        Ok(Box::new(MockNode {
            id: spec.id,
            state: Arc::clone(&self.state),
            ended,
            stopped: false,
        }))
    }
}

struct MockNode {
    id: NodeId,
    state: Arc<Mutex<MockState>>,
    ended: EndedNotifier,
    stopped: bool,
}

impl OutputNode for MockNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volumes.insert(self.id, volume);
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        {
            let mut state = self.state.lock();
            state.journal.push(Call::Stop(self.id));
            state.live.remove(&self.id);
        }
        self.ended.notify();
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.stop();
    }
}

/// In-memory files keyed by track file name.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    files: Arc<Mutex<HashMap<PathBuf, Bytes>>>,
    gate: Option<Arc<Notify>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads wait for [`Notify::notify_one`] on the returned handle.
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let provider = Self {
            files: Arc::default(),
            gate: Some(Arc::clone(&gate)),
        };
        (provider, gate)
    }

    pub fn insert(&self, file_name: impl Into<PathBuf>, data: &'static str) {
        self.files
            .lock()
            .insert(file_name.into(), Bytes::from_static(data.as_bytes()));
    }

    /// A track backed by `seconds` of mock audio.
    pub fn track(&self, title: &str, seconds: u32) -> Track {
        let file_name = format!("{title}.mp3");
        let data = Bytes::from(format!("dur:{seconds}"));
        self.files.lock().insert(PathBuf::from(&file_name), data);
        Track::new(title, file_name)
    }
}

#[async_trait]
impl ByteProvider for MemoryProvider {
    async fn read(&self, track: &Track) -> Result<Bytes> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.files
            .lock()
            .get(track.file_name())
            .cloned()
            .ok_or_else(|| Error::NotFound(track.file_name().display().to_string()))
    }
}

/// Sink that keeps every event.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    /// Events other than progress ticks.
    pub fn transitions(&self) -> Vec<PlayerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| !matches!(e, PlayerEvent::ProgressChanged(_)))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &PlayerEvent) {
        self.events.lock().push(event.clone());
    }
}
