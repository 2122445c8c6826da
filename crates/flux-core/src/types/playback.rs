//! Playback state, repeat policy, and progress reporting types.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};

use super::format_seconds;

/// Transport state of the player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What happens when a track or playlist reaches its end.
///
/// Manual `next()` and seeking ignore this, except that `next()` past the
/// last track only wraps with [`RepeatMode::All`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop at the end of the playlist.
    #[default]
    Off,
    /// Replay the current track when it finishes.
    Single,
    /// Wrap around to the first track after the last.
    All,
}

impl RepeatMode {
    /// Next mode in the Off -> All -> Single cycle.
    pub const fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::Single,
            Self::Single => Self::Off,
        }
    }
}

/// Snapshot of how far playback has progressed through the current track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlaybackProgress {
    /// Seconds elapsed.
    pub position: f64,
    /// Track length in seconds.
    pub duration: f64,
    /// How far into the track we are, 0 to 100.
    pub percentage: f64,
}

impl PlaybackProgress {
    /// Sentinel meaning "no track is loaded".
    pub const NONE: Self = Self {
        position: -1.0,
        duration: -1.0,
        percentage: -1.0,
    };

    /// Published alongside a stop.
    pub const ZERO: Self = Self {
        position: 0.0,
        duration: 0.0,
        percentage: 0.0,
    };

    /// Build a progress snapshot, clamping the percentage into `[0, 100]`.
    ///
    /// `position` may overshoot `duration` slightly because elapsed time is
    /// measured with a wall clock; the percentage never does.
    #[allow(clippy::manual_clamp)] // clamp() would propagate NaN
    pub fn new(position: f64, duration: f64) -> Self {
        let position = position.max(0.0);
        let duration = duration.max(0.0);
        let percentage = if duration > 0.0 {
            (position / duration * 100.0).min(100.0).max(0.0)
        } else {
            0.0
        };

        Self {
            position,
            duration,
            percentage,
        }
    }

    /// True for the [`PlaybackProgress::NONE`] sentinel.
    pub fn is_none(&self) -> bool {
        self.duration < 0.0
    }

    /// Format as "1:05 / 3:20".
    pub fn display(&self) -> String {
        if self.is_none() {
            return "--:-- / --:--".to_string();
        }
        format!(
            "{} / {}",
            format_seconds(self.position),
            format_seconds(self.duration)
        )
    }
}

impl Default for PlaybackProgress {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_play_state_default() {
        assert_eq!(PlayState::default(), PlayState::Stopped);
    }

    #[test]
    fn test_repeat_cycle() {
        let mut mode = RepeatMode::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            mode = mode.cycle();
            seen.push(mode);
        }
        assert_eq!(seen, [RepeatMode::All, RepeatMode::Single, RepeatMode::Off]);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_progress_percentage() {
        let progress = PlaybackProgress::new(30.0, 120.0);
        assert_eq!(progress.percentage, 25.0);
        assert_eq!(progress.display(), "0:30 / 2:00");

        let overshoot = PlaybackProgress::new(120.3, 120.0);
        assert_eq!(overshoot.percentage, 100.0);

        let empty = PlaybackProgress::new(5.0, 0.0);
        assert_eq!(empty.percentage, 0.0);
    }

    #[test]
    fn test_progress_sentinel() {
        assert!(PlaybackProgress::NONE.is_none());
        assert!(!PlaybackProgress::ZERO.is_none());
        assert_eq!(PlaybackProgress::NONE.display(), "--:-- / --:--");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&RepeatMode::Single).unwrap();
        assert_eq!(json, "\"single\"");
    }

    proptest! {
        #[test]
        fn percentage_stays_in_bounds(position in proptest::num::f64::ANY, duration in proptest::num::f64::ANY) {
            let progress = PlaybackProgress::new(position, duration);
            prop_assert!(progress.percentage >= 0.0);
            prop_assert!(progress.percentage <= 100.0);
        }

        #[test]
        fn overshoot_reports_full(duration in 0.1f64..10_000.0, extra in 0.0f64..5.0) {
            let progress = PlaybackProgress::new(duration + extra, duration);
            prop_assert!((progress.percentage - 100.0).abs() < f64::EPSILON);
        }
    }
}
