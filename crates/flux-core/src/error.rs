//! Error types for Flux.

use thiserror::Error;

/// Result type alias using Flux's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Flux.
#[derive(Error, Debug)]
pub enum Error {
    // Audio errors
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Audio output already started")]
    AlreadyStarted,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    NotFound(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No async runtime available")]
    NoRuntime,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error came from loading or decoding a track.
    ///
    /// These are scoped to the `play` call that raised them; the engine is
    /// left stopped and can be used again right away.
    pub const fn is_playback_failure(&self) -> bool {
        matches!(
            self,
            Self::AudioDecode(_) | Self::Io(_) | Self::NotFound(_)
        )
    }
}
