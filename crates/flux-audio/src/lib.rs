//! # flux-audio
//!
//! Playback engine for Flux.
//!
//! Layers, bottom up:
//! - [`backend`]: decode and output-node primitives, with a cpal
//!   implementation in [`output`] (symphonia decode, rubato resampling)
//! - [`controller`]: one live output node with pause/resume/seek and
//!   elapsed-time bookkeeping
//! - [`progress`]: periodic progress events while playing
//! - [`player`]: the playback state machine (tracks, playlists, repeat)

pub mod backend;
pub mod clock;
pub mod config;
pub mod controller;
pub mod decode;
pub mod output;
pub mod player;
pub mod progress;
pub mod resample;
pub mod sink;
pub mod source;

#[cfg(test)]
mod testing;

pub use backend::{AudioBackend, DecodedAudio, EndedNotifier, NodeEnded, NodeId, NodeSpec, OutputNode};
pub use clock::{Clock, SystemClock};
/// Test clock for driving elapsed time by hand. Not for production use.
pub use clock::ManualClock;
pub use config::PlayerConfig;
pub use controller::{OutputController, OutputState};
pub use output::{list_output_devices, CpalBackend};
pub use player::{PlayRequest, Player};
pub use progress::{ProgressTracker, Sampler};
pub use sink::BroadcastSink;
pub use source::{ByteProvider, FileByteProvider};
