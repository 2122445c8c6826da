//! Fan-out of player events to any number of listeners.

use flux_core::{EventSink, PlayerEvent};
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events buffered per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// [`EventSink`] backed by a tokio broadcast channel.
///
/// Subscribers that fall behind by more than the capacity lose the oldest
/// events and see `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<PlayerEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &PlayerEvent) {
        if self.tx.send(event.clone()).is_err() {
            trace!("No subscribers for {}", event.name());
        }
    }
}
