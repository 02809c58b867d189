//! Periodic retention sweep
//!
//! Purges durable records older than the retention horizon once right after
//! start, then on a fixed interval until stopped. A failed or timed-out sweep
//! is logged and the next tick tries again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use callstats_core::{Clock, RetentionTarget, SystemClock};
use callstats_domain::RetentionConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the retention sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Records older than `now - horizon_ms` are purged
    pub horizon_ms: i64,
    /// Time between sweeps
    pub interval: Duration,
    /// Upper bound for a single sweep
    pub timeout: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

impl From<&RetentionConfig> for SweeperConfig {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            horizon_ms: config.horizon_ms(),
            interval: config.sweep_interval(),
            timeout: config.sweep_timeout(),
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Records with `timestamp < cutoff` were purged
    pub cutoff: i64,
    pub deleted: u64,
    pub duration: Duration,
}

impl SweepReport {
    /// Elapsed time in whole milliseconds, saturating at `u64::MAX`.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Background retention sweeper with lifecycle management
pub struct RetentionSweeper {
    target: Arc<dyn RetentionTarget>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl RetentionSweeper {
    /// Sweeper over `target` using the wall clock.
    pub fn new(target: Arc<dyn RetentionTarget>, config: SweeperConfig) -> Self {
        Self::with_clock(target, Arc::new(SystemClock), config)
    }

    /// Sweeper computing cutoffs from `clock`.
    pub fn with_clock(
        target: Arc<dyn RetentionTarget>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            target,
            clock,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start sweeping: once now, then every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the sweeper is running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running().await {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so the sweeper can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let target = Arc::clone(&self.target);
        let clock = Arc::clone(&self.clock);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sweep_loop(target, clock, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!(
            interval_secs = self.config.interval.as_secs(),
            horizon_ms = self.config.horizon_ms,
            "Retention sweeper started"
        );

        Ok(())
    }

    /// Stop the sweeper and wait for the background task.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if the sweeper is stopped.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running().await {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "Retention sweep task panicked");
                    return Err(SchedulerError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Retention sweep task did not complete within timeout");
                    return Err(SchedulerError::Timeout { seconds: STOP_TIMEOUT.as_secs() });
                }
            }
        }

        info!("Retention sweeper stopped");

        Ok(())
    }

    /// A sweeper is running while it has an unfinished task handle.
    pub async fn is_running(&self) -> bool {
        let guard = self.task_handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run a single sweep now.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::JobFailed`] when the purge fails and
    /// [`SchedulerError::Timeout`] when it exceeds the configured timeout.
    pub async fn sweep_once(&self) -> SchedulerResult<SweepReport> {
        Self::sweep(self.target.as_ref(), self.clock.as_ref(), &self.config).await
    }

    async fn sweep(
        target: &dyn RetentionTarget,
        clock: &dyn Clock,
        config: &SweeperConfig,
    ) -> SchedulerResult<SweepReport> {
        let started = Instant::now();
        let cutoff = clock.now_ms().saturating_sub(config.horizon_ms);

        let deleted = tokio::time::timeout(config.timeout, target.purge_older_than(cutoff))
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: config.timeout.as_secs() })??;

        Ok(SweepReport { cutoff, deleted, duration: started.elapsed() })
    }

    async fn sweep_loop(
        target: Arc<dyn RetentionTarget>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Retention sweep loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    match Self::sweep(target.as_ref(), clock.as_ref(), &config).await {
                        Ok(report) => {
                            debug!(
                                cutoff = report.cutoff,
                                deleted = report.deleted,
                                duration_ms = report.duration_ms(),
                                "Retention sweep completed"
                            );
                        }
                        Err(e) => {
                            warn!(error = %e, "Retention sweep failed; retrying next tick");
                        }
                    }
                }
            }
        }
    }
}

/// Ensure the sweep task is cancelled when dropped
impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
        }
    }
}
