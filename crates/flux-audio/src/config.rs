//! Player configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::time::Duration;

use flux_core::{Error, RepeatMode, Result};
use serde::{Deserialize, Serialize};

/// Settings read once when a player is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// How often progress is published while playing, in milliseconds.
    pub progress_interval_ms: u64,
    /// Repeat mode the player starts in.
    pub repeat_mode: RepeatMode,
    /// Initial volume, 0 to 100.
    pub volume: u8,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 500,
            repeat_mode: RepeatMode::Off,
            volume: 100,
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(Error::InvalidArgument(
                "progressIntervalMs must be greater than 0".to_string(),
            ));
        }
        if self.volume > 100 {
            return Err(Error::InvalidArgument(format!(
                "volume must be between 0 and 100, got {}",
                self.volume
            )));
        }
        Ok(())
    }

    pub const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
