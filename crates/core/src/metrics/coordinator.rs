//! Two-tier storage coordinator
//!
//! Every recorded call is written to the recency store (Tier A) and the
//! durable store (Tier B). The two writes are independent: a failure in one
//! never blocks or rolls back the other. Range and historical reads go to
//! Tier B only; Tier A is a recency window, not a query surface.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use callstats_domain::constants::{DEFAULT_RETENTION_DAYS, EVENT_CHANNEL_CAPACITY, MS_PER_DAY};
use callstats_domain::{
    CallStatsError, Dimension, MetricRecord, NewMetricRecord, ResolvedRange, Result,
    RetentionConfig, StorageStatus,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::MetricRecordedEvent;
use super::ports::{Clock, DurableMetricStore, RecentMetricStore, RetentionTarget, SystemClock};

/// Coordinator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Records older than `now - retention_horizon_ms` are purged by
    /// [`StorageCoordinator::cleanup_old_data`].
    pub retention_horizon_ms: i64,
    /// Buffered notifications per subscriber before lagging.
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retention_horizon_ms: i64::from(DEFAULT_RETENTION_DAYS) * MS_PER_DAY,
            event_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl From<&RetentionConfig> for CoordinatorConfig {
    fn from(config: &RetentionConfig) -> Self {
        Self { retention_horizon_ms: config.horizon_ms(), ..Self::default() }
    }
}

/// Fans metric writes out to both storage tiers.
///
/// Construct once at application start and share it behind an `Arc`.
pub struct StorageCoordinator {
    durable: Arc<dyn DurableMetricStore>,
    recent: Arc<dyn RecentMetricStore>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    /// Mirror of Tier A, ascending by timestamp, never longer than its
    /// capacity. Held across the Tier A persist so concurrent saves cannot
    /// interleave inside one serialized payload.
    candidates: Mutex<Vec<MetricRecord>>,
    events: broadcast::Sender<MetricRecordedEvent>,
    durable_error: StdMutex<Option<String>>,
}

impl StorageCoordinator {
    /// Create a coordinator using the wall clock.
    ///
    /// The candidate list is hydrated from whatever Tier A already holds.
    pub fn new(
        durable: Arc<dyn DurableMetricStore>,
        recent: Arc<dyn RecentMetricStore>,
        config: CoordinatorConfig,
    ) -> Self {
        Self::with_clock(durable, recent, Arc::new(SystemClock), config)
    }

    /// Create a coordinator reading time from `clock`.
    pub fn with_clock(
        durable: Arc<dyn DurableMetricStore>,
        recent: Arc<dyn RecentMetricStore>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let mut candidates = recent.load();
        candidates.sort_by_key(|record| record.timestamp);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            durable,
            recent,
            clock,
            config,
            candidates: Mutex::new(candidates),
            events,
            durable_error: StdMutex::new(None),
        }
    }

    /// Initialise the durable tier.
    ///
    /// A failure is logged and reported through the returned status but is
    /// not fatal: Tier A keeps working and durable operations surface
    /// `CallStatsError::Unavailable` to their callers.
    pub async fn init(&self) -> StorageStatus {
        match self.durable.init().await {
            Ok(()) => {
                self.set_durable_error(None);
                info!("durable metric store ready");
            }
            Err(err) => {
                warn!(error = %err, "durable metric store failed to initialise; continuing with recent store only");
                self.set_durable_error(Some(err.to_string()));
            }
        }
        self.status().await
    }

    /// Subscribe to "metric recorded" notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MetricRecordedEvent> {
        self.events.subscribe()
    }

    /// Current time according to the coordinator's clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Record one completed call.
    ///
    /// Both tiers are always attempted. If the durable write fails, the error
    /// is returned after Tier A has been updated and no notification is
    /// published.
    pub async fn save_metric(&self, metric: NewMetricRecord) -> Result<MetricRecord> {
        metric.validate()?;
        let record = metric.into_record(Uuid::now_v7().to_string());

        let (durable, ()) = tokio::join!(
            self.durable.insert(&record),
            self.push_recent(std::slice::from_ref(&record))
        );

        match durable {
            Ok(()) => {
                debug!(id = %record.id, provider = %record.provider, "metric recorded");
                self.publish(record.clone());
                Ok(record)
            }
            Err(err) => {
                warn!(id = %record.id, error = %err, kind = err.label(), "durable write failed");
                Err(err)
            }
        }
    }

    /// Record several calls with one durable transaction.
    ///
    /// Validation is all-or-nothing: one invalid entry rejects the batch
    /// before either tier is touched.
    pub async fn save_metrics_batch(
        &self,
        metrics: Vec<NewMetricRecord>,
    ) -> Result<Vec<MetricRecord>> {
        if metrics.is_empty() {
            return Ok(Vec::new());
        }
        for metric in &metrics {
            metric.validate()?;
        }

        let records: Vec<MetricRecord> = metrics
            .into_iter()
            .map(|metric| metric.into_record(Uuid::now_v7().to_string()))
            .collect();

        let (durable, ()) =
            tokio::join!(self.durable.insert_batch(&records), self.push_recent(&records));

        match durable {
            Ok(inserted) => {
                debug!(count = inserted, "metric batch recorded");
                for record in &records {
                    self.publish(record.clone());
                }
                Ok(records)
            }
            Err(err) => {
                warn!(count = records.len(), error = %err, "durable batch write failed");
                Err(err)
            }
        }
    }

    /// Up to `limit` most recent records, newest first.
    ///
    /// Served from Tier A; falls back to the durable store when Tier A holds
    /// nothing.
    pub async fn get_recent_metrics(&self, limit: usize) -> Result<Vec<MetricRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        {
            let candidates = self.candidates.lock().await;
            if !candidates.is_empty() {
                return Ok(candidates.iter().rev().take(limit).cloned().collect());
            }
        }

        self.durable.query_recent(limit).await
    }

    /// Records with `start <= timestamp <= end`.
    pub async fn get_metrics_in_range(&self, start: i64, end: i64) -> Result<Vec<MetricRecord>> {
        if start > end {
            return Err(CallStatsError::InvalidInput(format!(
                "range start {start} is after end {end}"
            )));
        }
        self.durable.query_range(start, end).await
    }

    /// Every durable record, ascending by timestamp.
    pub async fn get_all_metrics(&self) -> Result<Vec<MetricRecord>> {
        self.durable.query_all().await
    }

    /// Durable records matching one dimension value, newest first.
    pub async fn get_by_dimension(
        &self,
        dimension: Dimension,
        value: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MetricRecord>> {
        self.durable.query_by_dimension(dimension, value, limit).await
    }

    /// Number of durable records.
    pub async fn count(&self) -> Result<u64> {
        self.durable.count().await
    }

    /// Snapshot of Tier A, ascending, optionally restricted to `window`.
    pub async fn recent_window(&self, window: Option<ResolvedRange>) -> Vec<MetricRecord> {
        let candidates = self.candidates.lock().await;
        candidates
            .iter()
            .filter(|record| window.map_or(true, |w| w.contains(record.timestamp)))
            .cloned()
            .collect()
    }

    /// Empty both tiers.
    ///
    /// Tier A is cleared first; a durable failure is returned afterwards.
    pub async fn clear_all(&self) -> Result<()> {
        {
            let mut candidates = self.candidates.lock().await;
            candidates.clear();
            self.recent.clear();
        }

        self.durable.clear().await?;
        info!("all metrics cleared");
        Ok(())
    }

    /// Purge durable records older than the retention horizon.
    pub async fn cleanup_old_data(&self) -> Result<u64> {
        let cutoff = self.now_ms().saturating_sub(self.config.retention_horizon_ms);
        self.purge_older_than(cutoff).await
    }

    /// Readiness of both tiers.
    pub async fn status(&self) -> StorageStatus {
        let recent_count = self.candidates.lock().await.len();
        let durable_error = match self.durable_error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        StorageStatus { durable_ready: self.durable.is_ready(), durable_error, recent_count }
    }

    /// Release the durable backend.
    pub async fn close(&self) -> Result<()> {
        self.durable.close().await
    }

    async fn push_recent(&self, records: &[MetricRecord]) {
        let capacity = self.recent.capacity();
        let mut candidates = self.candidates.lock().await;

        for record in records {
            let at = candidates.partition_point(|existing| existing.timestamp <= record.timestamp);
            candidates.insert(at, record.clone());
        }
        if candidates.len() > capacity {
            let excess = candidates.len() - capacity;
            candidates.drain(..excess);
        }

        // The medium may be a filesystem; keep its I/O off the runtime
        // threads. The lock stays held so saves land in order.
        let snapshot = candidates.clone();
        let recent = Arc::clone(&self.recent);
        if let Err(err) = tokio::task::spawn_blocking(move || recent.save(&snapshot)).await {
            warn!(error = %err, "recent store save task failed");
        }
    }

    fn publish(&self, record: MetricRecord) {
        if self.events.send(MetricRecordedEvent::new(record)).is_err() {
            debug!("no subscribers for metric notifications");
        }
    }

    fn set_durable_error(&self, error: Option<String>) {
        match self.durable_error.lock() {
            Ok(mut guard) => *guard = error,
            Err(poisoned) => *poisoned.into_inner() = error,
        }
    }
}

#[async_trait]
impl RetentionTarget for StorageCoordinator {
    async fn purge_older_than(&self, cutoff: i64) -> Result<u64> {
        let deleted = self.durable.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(cutoff, deleted, "purged expired metrics");
        }
        Ok(deleted)
    }
}
