//! # flux-core
//!
//! Core types, player events, and error handling for the Flux music player.

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::{EventSink, NullSink, PlayerEvent};
pub use types::*;
