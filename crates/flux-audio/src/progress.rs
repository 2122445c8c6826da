//! Periodic progress reporting while a track plays.

use std::sync::Arc;
use std::time::Duration;

use flux_core::{EventSink, PlaybackProgress, PlayerEvent};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Reads the current progress. `None` skips the tick.
pub type Sampler = Arc<dyn Fn() -> Option<PlaybackProgress> + Send + Sync>;

struct Ticker {
    task: JoinHandle<()>,
    cancelled: Arc<Mutex<bool>>,
}

/// Publishes `ProgressChanged` every interval until stopped.
pub struct ProgressTracker {
    sink: Arc<dyn EventSink>,
    ticker: Option<Ticker>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink, ticker: None }
    }

    /// Start ticking, replacing any running ticker. The first tick comes
    /// one interval from now.
    pub fn start(&mut self, runtime: &Handle, interval: Duration, sampler: Sampler) {
        self.stop();

        let interval = interval.max(Duration::from_millis(1));
        let cancelled = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&cancelled);
        let sink = Arc::clone(&self.sink);

        let task = runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(progress) = sampler() else {
                    continue;
                };
                // Held while publishing so `stop` cannot return mid-tick.
                let cancelled = flag.lock();
                if *cancelled {
                    break;
                }
                trace!("Progress {}", progress.display());
                sink.publish(&PlayerEvent::ProgressChanged(progress));
            }
        });

        self.ticker = Some(Ticker { task, cancelled });
    }

    /// Stop ticking. No tick is published once this returns.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            *ticker.cancelled.lock() = true;
            ticker.task.abort();
        }
    }

    pub const fn is_running(&self) -> bool {
        self.ticker.is_some()
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
