//! Core domain types for Flux.

pub mod album;
pub mod common;
pub mod playback;
pub mod playlist;
pub mod track;

pub use album::Album;
pub use common::format_seconds;
pub use playback::{PlayState, PlaybackProgress, RepeatMode};
pub use playlist::Playlist;
pub use track::Track;
