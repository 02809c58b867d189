//! Port interfaces for metric storage
//!
//! Two storage tiers sit behind these traits:
//! - [`RecentMetricStore`]: capacity-bounded recency window. Synchronous and
//!   infallible from the caller's point of view; degradation is handled
//!   inside the adapter.
//! - [`DurableMetricStore`]: the queryable source of truth. Asynchronous and
//!   fallible; an uninitialised or failed backend surfaces
//!   `CallStatsError::Unavailable`.

use async_trait::async_trait;
use callstats_domain::{Dimension, MetricRecord, Result};

/// Capacity-bounded recency store (Tier A).
pub trait RecentMetricStore: Send + Sync {
    /// Persist the candidate sequence, keeping only the most recent
    /// [`capacity`](Self::capacity) records by timestamp.
    ///
    /// Never fails; write-capacity problems are absorbed by the adapter.
    fn save(&self, records: &[MetricRecord]);

    /// Load the persisted window, ascending by timestamp.
    ///
    /// Returns an empty vector when nothing usable is stored.
    fn load(&self) -> Vec<MetricRecord>;

    /// Remove every persisted copy. Safe when nothing is stored.
    fn clear(&self);

    /// Maximum number of records kept.
    fn capacity(&self) -> usize;
}

/// Durable, indexed record store (Tier B).
#[async_trait]
pub trait DurableMetricStore: Send + Sync {
    /// Open the backend. Idempotent; concurrent calls share one attempt.
    async fn init(&self) -> Result<()>;

    /// Whether the backend finished initialising and is not closed.
    fn is_ready(&self) -> bool;

    /// Insert a single record.
    async fn insert(&self, record: &MetricRecord) -> Result<()>;

    /// Insert several records; an empty slice resolves without touching the
    /// backend.
    async fn insert_batch(&self, records: &[MetricRecord]) -> Result<usize>;

    /// Records with `start <= timestamp <= end`.
    async fn query_range(&self, start: i64, end: i64) -> Result<Vec<MetricRecord>>;

    /// Equality lookup on an indexed dimension, optionally capped.
    async fn query_by_dimension(
        &self,
        dimension: Dimension,
        value: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MetricRecord>>;

    /// The `limit` newest records, newest first.
    async fn query_recent(&self, limit: usize) -> Result<Vec<MetricRecord>>;

    /// Every stored record.
    async fn query_all(&self) -> Result<Vec<MetricRecord>>;

    /// Total number of stored records.
    async fn count(&self) -> Result<u64>;

    /// Delete every record with `timestamp < cutoff`, returning how many
    /// were removed.
    async fn delete_older_than(&self, cutoff: i64) -> Result<u64>;

    /// Remove all records.
    async fn clear(&self) -> Result<()>;

    /// Release backend resources. A no-op if never initialised.
    async fn close(&self) -> Result<()>;
}

/// Target of the periodic retention sweep.
#[async_trait]
pub trait RetentionTarget: Send + Sync {
    /// Purge durable records older than `cutoff` (epoch milliseconds).
    async fn purge_older_than(&self, cutoff: i64) -> Result<u64>;
}

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}
