//! The playback state machine.
//!
//! [`Player`] decides what plays: it owns the output controller and the
//! progress tracker, applies repeat and playlist policy when a track ends,
//! and publishes every state change to an [`EventSink`].
//!
//! All state sits behind one mutex that is never held across an await.
//! Loading a track is the only suspension point; a load is discarded when
//! a `stop()` lands while it is in flight.

use std::sync::{Arc, Weak};

use flux_core::{
    Error, EventSink, PlayState, PlaybackProgress, PlayerEvent, Playlist, RepeatMode, Result, Track,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, trace, warn};

use crate::backend::{AudioBackend, DecodedAudio, NodeEnded};
use crate::clock::{Clock, SystemClock};
use crate::config::PlayerConfig;
use crate::controller::OutputController;
use crate::output::CpalBackend;
use crate::progress::{ProgressTracker, Sampler};
use crate::source::ByteProvider;

/// What to play.
#[derive(Debug, Clone)]
pub enum PlayRequest {
    /// A single track, outside of any playlist.
    Track(Track),
    /// A playlist, from `start` if it is in the playlist, else from the top.
    Playlist {
        playlist: Arc<Playlist>,
        start: Option<Track>,
    },
}

struct PlayerState {
    state: PlayState,
    track: Option<Track>,
    /// `None` in single-track mode.
    playlist: Option<Arc<Playlist>>,
    /// Index into `playlist`; `Some` exactly when a playlist is active.
    cursor: Option<usize>,
    repeat_mode: RepeatMode,
    /// Set by a seek while playing and consumed by the end signal of the
    /// node the seek replaced. Cleared on pause and stop.
    seeking: bool,
    loading: bool,
    /// Bumped by every stop so that in-flight loads can tell they are stale.
    load_generation: u64,
    output: OutputController,
    tracker: ProgressTracker,
}

struct Shared {
    inner: Mutex<PlayerState>,
    provider: Arc<dyn ByteProvider>,
    sink: Arc<dyn EventSink>,
    runtime: Handle,
    config: PlayerConfig,
}

/// A track picked for loading, with the generation it was picked under.
struct PendingLoad {
    track: Track,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Forward,
    Back,
}

/// Handle to the playback engine. Cheap to clone.
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
}

impl Player {
    /// Create a player. Must be called from within a tokio runtime.
    ///
    /// # Deadlocks
    ///
    /// `sink` is called while the player's state lock is held. A sink that
    /// calls back into this player (or any clone of it) deadlocks. Sinks
    /// that need to react to events should hand them off, for example
    /// through [`BroadcastSink`](crate::BroadcastSink).
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        provider: Arc<dyn ByteProvider>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: PlayerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (ended_tx, ended_rx) = unbounded_channel();
        let mut output = OutputController::new(backend, clock, ended_tx);
        output.set_volume(config.volume);

        let inner = PlayerState {
            state: PlayState::Stopped,
            track: None,
            playlist: None,
            cursor: None,
            repeat_mode: config.repeat_mode,
            seeking: false,
            loading: false,
            load_generation: 0,
            output,
            tracker: ProgressTracker::new(Arc::clone(&sink)),
        };

        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            provider,
            sink,
            runtime: runtime.clone(),
            config,
        });

        runtime.spawn(listen_for_completion(Arc::downgrade(&shared), ended_rx));
        debug!("Player created");

        Ok(Self { shared })
    }

    /// Create a player on the default output device.
    pub fn with_system_output(
        provider: Arc<dyn ByteProvider>,
        sink: Arc<dyn EventSink>,
        config: PlayerConfig,
    ) -> Result<Self> {
        let backend = CpalBackend::new()?;
        info!("Player output: {}", backend.device_name());
        Self::new(
            Arc::new(backend),
            provider,
            sink,
            Arc::new(SystemClock::new()),
            config,
        )
    }

    /// Play a track or playlist, replacing whatever is playing.
    ///
    /// Ignored while another play is still loading. On error the player is
    /// left stopped.
    pub async fn play(&self, request: PlayRequest) -> Result<()> {
        let pending = {
            let mut inner = self.shared.inner.lock();
            if inner.loading {
                debug!("Play ignored: a track is already loading");
                return Ok(());
            }

            let track = match request {
                PlayRequest::Track(track) => {
                    self.stop_locked(&mut inner);
                    inner.playlist = None;
                    inner.cursor = None;
                    track
                }
                PlayRequest::Playlist { playlist, start } => {
                    let cursor = start
                        .as_ref()
                        .and_then(|track| playlist.position_of(track))
                        .unwrap_or(0);
                    let Some(track) = playlist.get(cursor).cloned() else {
                        debug!("Play ignored: playlist '{}' is empty", playlist.name());
                        return Ok(());
                    };
                    self.stop_locked(&mut inner);
                    inner.playlist = Some(playlist);
                    inner.cursor = Some(cursor);
                    track
                }
            };

            inner.loading = true;
            PendingLoad {
                track,
                generation: inner.load_generation,
            }
        };

        self.load(pending).await
    }

    pub async fn play_track(&self, track: Track) -> Result<()> {
        self.play(PlayRequest::Track(track)).await
    }

    pub async fn play_playlist(&self, playlist: Arc<Playlist>, start: Option<Track>) -> Result<()> {
        self.play(PlayRequest::Playlist { playlist, start }).await
    }

    pub fn pause(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state != PlayState::Playing {
            return;
        }

        inner.tracker.stop();
        inner.seeking = false;
        inner.state = PlayState::Paused;
        self.emit(PlayerEvent::Paused);
        inner.output.pause();
        info!("Paused at {:.2}s", inner.output.elapsed());
    }

    /// Resume after a pause, optionally from `from_offset` seconds.
    pub fn resume(&self, from_offset: Option<f64>) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != PlayState::Paused {
            return Ok(());
        }

        inner.output.resume(from_offset)?;
        inner.state = PlayState::Playing;
        self.emit(PlayerEvent::Playing(None));
        self.start_tracker(&mut inner);
        info!("Resumed at {:.2}s", inner.output.elapsed());
        Ok(())
    }

    /// Move to `position` seconds. Positions outside the track are ignored.
    pub fn seek(&self, position: f64) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        self.seek_locked(&mut inner, position)
    }

    /// Skip to the next playlist track.
    pub async fn next(&self) -> Result<()> {
        let pending = {
            let mut inner = self.shared.inner.lock();
            self.step_locked(&mut inner, Step::Forward)?
        };
        match pending {
            Some(pending) => self.load(pending).await,
            None => Ok(()),
        }
    }

    /// Go back to the previous playlist track. On the first track this
    /// restarts it, unless repeat-all wraps to the last one.
    pub async fn previous(&self) -> Result<()> {
        let pending = {
            let mut inner = self.shared.inner.lock();
            self.step_locked(&mut inner, Step::Back)?
        };
        match pending {
            Some(pending) => self.load(pending).await,
            None => Ok(()),
        }
    }

    /// Stop playback. Also cancels a load in flight.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        self.stop_locked(&mut inner);
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        let mut inner = self.shared.inner.lock();
        inner.repeat_mode = mode;
        self.emit(PlayerEvent::RepeatModeChanged(mode));
        debug!("Repeat mode: {mode:?}");
    }

    /// Step to the next repeat mode and return it.
    pub fn cycle_repeat_mode(&self) -> RepeatMode {
        let mode = self.repeat_mode().cycle();
        self.set_repeat_mode(mode);
        mode
    }

    /// Set the volume in percent. Values above 100 are ignored.
    pub fn set_volume(&self, volume: u8) {
        self.shared.inner.lock().output.set_volume(volume);
    }

    pub fn volume(&self) -> u8 {
        self.shared.inner.lock().output.volume()
    }

    pub fn state(&self) -> PlayState {
        self.shared.inner.lock().state
    }

    pub fn current_track(&self) -> Option<Track> {
        self.shared.inner.lock().track.clone()
    }

    pub fn current_playlist(&self) -> Option<Arc<Playlist>> {
        self.shared.inner.lock().playlist.clone()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.shared.inner.lock().cursor
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.shared.inner.lock().repeat_mode
    }

    /// Current progress, or [`PlaybackProgress::NONE`] when stopped.
    pub fn progress(&self) -> PlaybackProgress {
        let inner = self.shared.inner.lock();
        progress_of(&inner)
    }

    pub fn is_loading(&self) -> bool {
        self.shared.inner.lock().loading
    }

    /// Publish to the sink. Called with the state lock held.
    fn emit(&self, event: PlayerEvent) {
        trace!("Publishing {}", event.name());
        self.shared.sink.publish(&event);
    }

    fn sampler(&self) -> Sampler {
        let weak = Arc::downgrade(&self.shared);
        Arc::new(move || {
            let shared = weak.upgrade()?;
            let inner = shared.inner.lock();
            (inner.state == PlayState::Playing).then(|| progress_of(&inner))
        })
    }

    fn start_tracker(&self, inner: &mut PlayerState) {
        let sampler = self.sampler();
        inner.tracker.start(
            &self.shared.runtime,
            self.shared.config.progress_interval(),
            sampler,
        );
    }

    /// Read and decode a track, then start it unless a stop superseded the
    /// load in the meantime.
    async fn load(&self, pending: PendingLoad) -> Result<()> {
        let PendingLoad { track, generation } = pending;
        debug!("Loading {}", track.display_name());

        let decoded = self.fetch(&track).await;

        let mut inner = self.shared.inner.lock();
        if inner.load_generation != generation {
            debug!("Discarding stale load of {}", track.display_name());
            return Ok(());
        }
        inner.loading = false;

        let started = decoded.and_then(|audio| inner.output.start_decoded(audio));
        if let Err(e) = started {
            warn!("Failed to play {}: {e}", track.display_name());
            return Err(e);
        }

        inner.state = PlayState::Playing;
        inner.track = Some(track.clone());
        info!(
            "Playing {} ({:.2}s)",
            track.display_name(),
            inner.output.current_duration()
        );
        self.emit(PlayerEvent::Playing(Some(track)));
        self.start_tracker(&mut inner);
        Ok(())
    }

    async fn fetch(&self, track: &Track) -> Result<DecodedAudio> {
        let data = self.shared.provider.read(track).await?;
        let decode = self.shared.inner.lock().output.decode(data);
        decode.await
    }

    fn stop_locked(&self, inner: &mut PlayerState) {
        inner.load_generation = inner.load_generation.wrapping_add(1);
        inner.loading = false;

        if inner.state == PlayState::Stopped {
            return;
        }

        inner.tracker.stop();
        inner.output.stop();
        inner.track = None;
        inner.seeking = false;
        inner.state = PlayState::Stopped;
        self.emit(PlayerEvent::Stopped);
        self.emit(PlayerEvent::ProgressChanged(PlaybackProgress::ZERO));
        info!("Stopped");
    }

    fn seek_locked(&self, inner: &mut PlayerState, position: f64) -> Result<()> {
        match inner.state {
            PlayState::Stopped => Ok(()),
            PlayState::Paused => {
                if inner.output.reposition(position) {
                    self.emit(PlayerEvent::Seeking(position));
                    debug!("Paused position moved to {position:.2}s");
                } else {
                    debug!("Seek to {position} ignored");
                }
                Ok(())
            }
            PlayState::Playing => {
                if !inner.output.in_range(position) {
                    debug!("Seek to {position} ignored");
                    return Ok(());
                }

                inner.seeking = true;
                inner.tracker.stop();
                inner.output.pause();
                if let Err(e) = inner.output.resume(Some(position)) {
                    warn!("Seek failed: {e}");
                    inner.seeking = false;
                    inner.state = PlayState::Paused;
                    self.emit(PlayerEvent::Paused);
                    return Err(e);
                }

                self.emit(PlayerEvent::Seeking(position));
                self.start_tracker(inner);
                debug!("Seeked to {position:.2}s");
                Ok(())
            }
        }
    }

    /// Move the playlist cursor one step. Returns the track to load, if any.
    fn step_locked(&self, inner: &mut PlayerState, step: Step) -> Result<Option<PendingLoad>> {
        if inner.state != PlayState::Playing || inner.loading {
            return Ok(None);
        }
        let (Some(playlist), Some(cursor)) = (inner.playlist.clone(), inner.cursor) else {
            return Ok(None);
        };

        let wrap = inner.repeat_mode == RepeatMode::All;
        let target = match step {
            Step::Forward if cursor + 1 < playlist.len() => Some(cursor + 1),
            Step::Forward => wrap.then_some(0),
            Step::Back if cursor > 0 => Some(cursor - 1),
            Step::Back if wrap => playlist.len().checked_sub(1),
            Step::Back => {
                // First track: start it over instead.
                return self.seek_locked(inner, 0.0).map(|()| None);
            }
        };

        self.stop_locked(inner);

        let Some(track) = target.and_then(|i| playlist.get(i).cloned()) else {
            info!("Reached the end of playlist '{}'", playlist.name());
            inner.playlist = None;
            inner.cursor = None;
            return Ok(None);
        };

        inner.cursor = target;
        inner.loading = true;
        Ok(Some(PendingLoad {
            track,
            generation: inner.load_generation,
        }))
    }

    /// Apply repeat and playlist policy to a node that stopped producing
    /// sound.
    async fn on_node_ended(&self, ended: NodeEnded) -> Result<()> {
        let pending = {
            let mut inner = self.shared.inner.lock();
            if inner.state != PlayState::Playing {
                return Ok(());
            }
            // The live node's end is always real; only replaced nodes are
            // ever swallowed.
            if !inner.output.is_live(ended.node) {
                if std::mem::take(&mut inner.seeking) {
                    trace!("End of node {} swallowed by seek", ended.node);
                } else {
                    trace!("Ignoring end of stale node {}", ended.node);
                }
                return Ok(());
            }

            if inner.repeat_mode == RepeatMode::Single {
                let Some(track) = inner.track.clone() else {
                    return Ok(());
                };
                debug!("Repeating {}", track.display_name());
                inner.tracker.stop();
                self.emit(PlayerEvent::Repeating(track));
                if let Err(e) = inner.output.restart() {
                    self.stop_locked(&mut inner);
                    return Err(e);
                }
                self.start_tracker(&mut inner);
                return Ok(());
            }

            if inner.playlist.is_some() {
                self.step_locked(&mut inner, Step::Forward)?
            } else {
                self.stop_locked(&mut inner);
                None
            }
        };

        match pending {
            Some(pending) => self.load(pending).await,
            None => Ok(()),
        }
    }
}

fn progress_of(inner: &PlayerState) -> PlaybackProgress {
    if inner.state == PlayState::Stopped {
        return PlaybackProgress::NONE;
    }
    PlaybackProgress::new(inner.output.elapsed(), inner.output.current_duration())
}

/// Consumes end-of-node signals for as long as the player exists.
async fn listen_for_completion(weak: Weak<Shared>, mut ended_rx: UnboundedReceiver<NodeEnded>) {
    while let Some(ended) = ended_rx.recv().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        let player = Player { shared };
        if let Err(e) = player.on_node_ended(ended).await {
            warn!("Failed to continue after track end: {e}");
        }
    }
    debug!("Completion listener finished");
}
