//! Player events and the sink they are published to.
//!
//! The player does not own any subscriber machinery. It is handed an
//! [`EventSink`] at construction and publishes every transition to it,
//! synchronously and in the order the transitions happen.

use serde::{Deserialize, Serialize};

use crate::types::{PlayState, PlaybackProgress, RepeatMode, Track};

/// Events raised by the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Playback started. Carries the track when a new track began, `None`
    /// when a paused track resumed.
    Playing(Option<Track>),
    /// Playback paused.
    Paused,
    /// Playback stopped. Always followed by a zeroed `ProgressChanged`.
    Stopped,
    /// The position was moved to the given number of seconds.
    Seeking(f64),
    /// The track finished and is about to play again.
    Repeating(Track),
    /// Periodic progress while playing.
    ProgressChanged(PlaybackProgress),
    /// The repeat mode was changed.
    RepeatModeChanged(RepeatMode),
}

impl PlayerEvent {
    /// Catalog name of the event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Playing(_) | Self::Paused | Self::Stopped | Self::Seeking(_) => "player.state",
            Self::Repeating(_) => "repeat.repeating",
            Self::ProgressChanged(_) => "state.progress.changed",
            Self::RepeatModeChanged(_) => "repeat.mode.changed",
        }
    }

    /// The play state this event announces, if it is a state event.
    pub const fn play_state(&self) -> Option<PlayState> {
        match self {
            Self::Playing(_) => Some(PlayState::Playing),
            Self::Paused => Some(PlayState::Paused),
            Self::Stopped => Some(PlayState::Stopped),
            _ => None,
        }
    }
}

/// Destination for player events.
///
/// `publish` is called while the player holds its state lock, so
/// implementations must return quickly and must not call back into the
/// player.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &PlayerEvent);
}

impl<F> EventSink for F
where
    F: Fn(&PlayerEvent) + Send + Sync,
{
    fn publish(&self, event: &PlayerEvent) {
        self(event);
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &PlayerEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_event_names() {
        assert_eq!(PlayerEvent::Paused.name(), "player.state");
        assert_eq!(PlayerEvent::Seeking(3.0).name(), "player.state");
        assert_eq!(
            PlayerEvent::ProgressChanged(PlaybackProgress::ZERO).name(),
            "state.progress.changed"
        );
        assert_eq!(
            PlayerEvent::RepeatModeChanged(RepeatMode::All).name(),
            "repeat.mode.changed"
        );
        assert_eq!(
            PlayerEvent::Repeating(Track::new("a", "a.mp3")).name(),
            "repeat.repeating"
        );
    }

    #[test]
    fn test_play_state() {
        assert_eq!(PlayerEvent::Playing(None).play_state(), Some(PlayState::Playing));
        assert_eq!(PlayerEvent::Stopped.play_state(), Some(PlayState::Stopped));
        assert_eq!(PlayerEvent::Seeking(1.0).play_state(), None);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &PlayerEvent| {
            if let Ok(mut seen) = seen.lock() {
                seen.push(event.name());
            }
        };
        sink.publish(&PlayerEvent::Paused);
        NullSink.publish(&PlayerEvent::Paused);
        assert_eq!(seen.lock().map(|s| s.len()).unwrap_or_default(), 1);
    }
}
