//! Shared test helpers for `callstats-core` integration tests.
//!
//! In-memory stand-ins for both storage tiers so coordinator and
//! aggregation tests can focus on behaviour instead of I/O.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use async_trait::async_trait;
use callstats_core::{CoordinatorConfig, DurableMetricStore, FixedClock, RecentMetricStore, StorageCoordinator};
use callstats_domain::{
    CallStatsError, CallStatus, Dimension, MetricRecord, NewMetricRecord, Result,
};

/// How [`FakeDurableStore`] responds to operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    Healthy,
    Unavailable,
    Database,
}

/// Durable store backed by a `Vec`, with switchable failure modes.
pub struct FakeDurableStore {
    records: Mutex<Vec<MetricRecord>>,
    mode: Mutex<FailMode>,
    ready: AtomicBool,
    pub init_calls: AtomicUsize,
}

impl FakeDurableStore {
    pub fn new() -> Arc<Self> {
        Self::with_mode(FailMode::Healthy)
    }

    pub fn with_mode(mode: FailMode) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            mode: Mutex::new(mode),
            ready: AtomicBool::new(false),
            init_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_mode(&self, mode: FailMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn seed(&self, records: Vec<MetricRecord>) {
        self.records.lock().unwrap().extend(records);
    }

    pub fn stored(&self) -> Vec<MetricRecord> {
        self.records.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match *self.mode.lock().unwrap() {
            FailMode::Healthy => Ok(()),
            FailMode::Unavailable => Err(CallStatsError::Unavailable("fake store offline".into())),
            FailMode::Database => Err(CallStatsError::Database("fake store broken".into())),
        }
    }
}

#[async_trait]
impl DurableMetricStore for FakeDurableStore {
    async fn init(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn insert(&self, record: &MetricRecord) -> Result<()> {
        self.check()?;
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn insert_batch(&self, records: &[MetricRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.check()?;
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(records.len())
    }

    async fn query_range(&self, start: i64, end: i64) -> Result<Vec<MetricRecord>> {
        self.check()?;
        Ok(self
            .stored()
            .into_iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .collect())
    }

    async fn query_by_dimension(
        &self,
        dimension: Dimension,
        value: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MetricRecord>> {
        self.check()?;
        Ok(self
            .stored()
            .into_iter()
            .filter(|r| r.dimension_value(dimension) == value)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<MetricRecord>> {
        self.check()?;
        let mut records = self.stored();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    async fn query_all(&self) -> Result<Vec<MetricRecord>> {
        self.check()?;
        Ok(self.stored())
    }

    async fn count(&self) -> Result<u64> {
        self.check()?;
        Ok(self.records.lock().unwrap().len() as u64)
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<u64> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.timestamp >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.check()?;
        self.records.lock().unwrap().clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Recency store holding its window in memory.
pub struct MemoryRecentStore {
    records: Mutex<Vec<MetricRecord>>,
    capacity: usize,
    pub saves: AtomicUsize,
    /// Thread each `save` ran on.
    pub save_threads: Mutex<Vec<ThreadId>>,
}

impl MemoryRecentStore {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            capacity,
            saves: AtomicUsize::new(0),
            save_threads: Mutex::new(Vec::new()),
        })
    }

    pub fn with_records(capacity: usize, records: Vec<MetricRecord>) -> Arc<Self> {
        let store = Self::new(capacity);
        store.save(&records);
        store.saves.store(0, Ordering::SeqCst);
        store.save_threads.lock().unwrap().clear();
        store
    }

    /// Ids of the persisted window, ascending by timestamp.
    pub fn load_ids(&self) -> Vec<String> {
        self.load().into_iter().map(|r| r.id).collect()
    }
}

impl RecentMetricStore for MemoryRecentStore {
    fn save(&self, records: &[MetricRecord]) {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.save_threads.lock().unwrap().push(std::thread::current().id());
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.timestamp);
        let skip = sorted.len().saturating_sub(self.capacity);
        *self.records.lock().unwrap() = sorted.split_off(skip);
    }

    fn load(&self) -> Vec<MetricRecord> {
        self.records.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Coordinator over fresh fakes with the clock pinned at `now`.
pub fn coordinator_at(
    now: i64,
    durable: Arc<FakeDurableStore>,
    recent: Arc<MemoryRecentStore>,
) -> Arc<StorageCoordinator> {
    Arc::new(StorageCoordinator::with_clock(
        durable,
        recent,
        Arc::new(FixedClock(now)),
        CoordinatorConfig::default(),
    ))
}

pub fn metric(timestamp: i64, provider: &str, status: CallStatus, latency: u64) -> NewMetricRecord {
    NewMetricRecord::new(timestamp, provider, "model-a", status, latency)
}

pub fn stored(id: &str, timestamp: i64, provider: &str, status: CallStatus, latency: u64) -> MetricRecord {
    metric(timestamp, provider, status, latency).into_record(id)
}
