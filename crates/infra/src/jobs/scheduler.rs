//! Cleanup scheduling: startup sweep, periodic sweeps and manual triggers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::retention::{RetentionSweeper, SweepReport};
use super::store::JobStore;

/// Default time between scheduled sweeps.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Shortest accepted tick interval. `tokio::time::interval` rejects zero.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Longest accepted tick interval (30 days).
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CleanupError {
    /// The sweep task panicked or was cancelled before finishing.
    #[error("cleanup sweep aborted: {0}")]
    Aborted(String),
}

/// Configures and starts the cleanup loop.
#[derive(Debug)]
pub struct CleanupScheduler<S: JobStore + 'static> {
    sweeper: Arc<RetentionSweeper<S>>,
    tick_interval: Duration,
}

impl<S: JobStore + 'static> CleanupScheduler<S> {
    pub fn new(sweeper: Arc<RetentionSweeper<S>>) -> Self {
        Self {
            sweeper,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Set the time between scheduled sweeps, clamped to
    /// [`MIN_TICK_INTERVAL`]..=[`MAX_TICK_INTERVAL`].
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        let clamped = interval.clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL);
        if clamped != interval {
            warn!(
                requested_ms = interval.as_millis() as u64,
                used_ms = clamped.as_millis() as u64,
                "cleanup interval out of range; clamped"
            );
        }
        self.tick_interval = clamped;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run the startup sweep to completion, then spawn the periodic loop.
    ///
    /// The first scheduled tick fires one interval after this returns.
    pub async fn start(self) -> CleanupHandle<S> {
        let trigger = CleanupTrigger {
            sweeper: self.sweeper,
        };

        info!("running initial cleanup");
        if let Err(e) = trigger.run_now().await {
            error!(error = %e, "initial cleanup failed");
        }

        let shutdown = Arc::new(Notify::new());
        let join = tokio::spawn(cleanup_loop(
            trigger.clone(),
            self.tick_interval,
            shutdown.clone(),
        ));

        CleanupHandle {
            trigger,
            shutdown,
            join,
        }
    }
}

/// On-demand access to the sweeper. Cheap to clone.
#[derive(Debug)]
pub struct CleanupTrigger<S: JobStore + 'static> {
    sweeper: Arc<RetentionSweeper<S>>,
}

impl<S: JobStore + 'static> Clone for CleanupTrigger<S> {
    fn clone(&self) -> Self {
        Self {
            sweeper: self.sweeper.clone(),
        }
    }
}

impl<S: JobStore + 'static> CleanupTrigger<S> {
    pub fn sweeper(&self) -> &RetentionSweeper<S> {
        &self.sweeper
    }

    /// Run a sweep now, on the blocking pool, and wait for its report.
    ///
    /// Sweeps serialize on the store lock, so this is safe to call while a
    /// scheduled sweep is in flight.
    pub async fn run_now(&self) -> Result<SweepReport, CleanupError> {
        let sweeper = self.sweeper.clone();
        tokio::task::spawn_blocking(move || sweeper.sweep())
            .await
            .map_err(|e| CleanupError::Aborted(e.to_string()))
    }
}

/// Handle to a running cleanup loop (manual trigger + shutdown).
#[derive(Debug)]
pub struct CleanupHandle<S: JobStore + 'static> {
    trigger: CleanupTrigger<S>,
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl<S: JobStore + 'static> CleanupHandle<S> {
    pub fn trigger(&self) -> CleanupTrigger<S> {
        self.trigger.clone()
    }

    /// Stop the loop, letting an in-flight sweep finish first.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            error!(error = %e, "cleanup loop ended abnormally");
        }
    }
}

async fn cleanup_loop<S: JobStore + 'static>(
    trigger: CleanupTrigger<S>,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    let interval = interval.clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL);
    info!(
        interval_secs = interval.as_secs(),
        retention_secs = trigger.sweeper().policy().window().num_seconds(),
        "cleanup scheduler started"
    );

    let now = Instant::now();
    let first_tick = now.checked_add(interval).unwrap_or_else(|| {
        warn!("cleanup interval overflows the clock; ticking immediately");
        now
    });
    let mut ticker = tokio::time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = ticker.tick() => {
                info!("running scheduled cleanup");
                // A failed tick is logged; later ticks still run.
                match trigger.run_now().await {
                    Ok(report) => debug!(
                        removed = report.removed_count(),
                        remaining = trigger.sweeper().store().len(),
                        "scheduled cleanup finished"
                    ),
                    Err(e) => error!(error = %e, "scheduled cleanup failed"),
                }
            }
        }
    }

    info!("cleanup scheduler stopped");
}
