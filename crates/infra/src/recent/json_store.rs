//! Capacity-bounded recency store persisted as one JSON array.
//!
//! The window is written under a primary key and mirrored under a backup
//! key. When the medium reports it is full, the save degrades instead of
//! failing: first a compressed payload, then only the newest few records,
//! then nothing.

use std::sync::Arc;

use callstats_core::RecentMetricStore;
use callstats_domain::{MetricRecord, RecentStoreConfig};
use tracing::{debug, error, warn};

use super::compression::PayloadCodec;
use super::medium::{MediumError, StorageMedium};

/// Which stage of a save reached the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Plain JSON payload with every record in the window.
    Full { records: usize },
    /// Compressed payload with every record in the window.
    Compressed { records: usize },
    /// Only the newest records fitted.
    Truncated { records: usize },
    /// Nothing was written.
    Abandoned,
}

impl SaveOutcome {
    /// Records that reached the medium.
    pub fn records_written(self) -> usize {
        match self {
            Self::Full { records } | Self::Compressed { records } | Self::Truncated { records } => {
                records
            }
            Self::Abandoned => 0,
        }
    }
}

/// Recency store over a [`StorageMedium`].
pub struct BoundedJsonStore {
    medium: Arc<dyn StorageMedium>,
    codec: PayloadCodec,
    capacity: usize,
    fallback_capacity: usize,
    primary_key: String,
    backup_key: String,
}

impl BoundedJsonStore {
    /// Store over `medium` with the capacities and keys from `config`.
    pub fn new(medium: Arc<dyn StorageMedium>, config: &RecentStoreConfig) -> Self {
        Self {
            medium,
            codec: PayloadCodec::default(),
            capacity: config.capacity.max(1),
            fallback_capacity: config.fallback_capacity.clamp(1, config.capacity.max(1)),
            primary_key: config.primary_key.clone(),
            backup_key: config.backup_key.clone(),
        }
    }

    /// Persist the newest `capacity` records of `records`.
    pub fn persist(&self, records: &[MetricRecord]) -> SaveOutcome {
        let mut window = records.to_vec();
        window.sort_by_key(|record| record.timestamp);
        let skip = window.len().saturating_sub(self.capacity);
        let window = &window[skip..];

        let json = match serde_json::to_string(window) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "failed to serialize recent metrics");
                return SaveOutcome::Abandoned;
            }
        };

        match self.write(&json) {
            Ok(()) => return SaveOutcome::Full { records: window.len() },
            Err(err) if err.is_quota_exceeded() => {
                warn!(records = window.len(), error = %err, "recent store full; retrying compressed");
            }
            Err(err) => {
                error!(error = %err, "recent store write failed");
                return SaveOutcome::Abandoned;
            }
        }

        match self.codec.compress(&json) {
            Ok(payload) => match self.write(&payload) {
                Ok(()) => return SaveOutcome::Compressed { records: window.len() },
                Err(err) if err.is_quota_exceeded() => {
                    warn!(
                        records = self.fallback_capacity,
                        error = %err,
                        "compressed payload rejected; keeping newest records only"
                    );
                }
                Err(err) => {
                    error!(error = %err, "recent store write failed");
                    return SaveOutcome::Abandoned;
                }
            },
            Err(err) => warn!(error = %err, "failed to compress recent metrics"),
        }

        let tail = &window[window.len().saturating_sub(self.fallback_capacity)..];
        let truncated = match serde_json::to_string(tail) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "failed to serialize recent metrics");
                return SaveOutcome::Abandoned;
            }
        };

        match self.write(&truncated) {
            Ok(()) => SaveOutcome::Truncated { records: tail.len() },
            Err(err) => {
                error!(error = %err, "recent store save abandoned");
                SaveOutcome::Abandoned
            }
        }
    }

    /// Write the primary copy, then mirror it under the backup key.
    ///
    /// A rejected mirror fails the whole write so the caller moves on to a
    /// smaller stage. The stale mirror is dropped first so it can never be
    /// restored in place of the primary.
    fn write(&self, payload: &str) -> Result<(), MediumError> {
        self.medium.set(&self.primary_key, payload)?;

        if let Err(err) = self.medium.set(&self.backup_key, payload) {
            warn!(error = %err, "failed to write recent metrics backup");
            if let Err(remove_err) = self.medium.remove(&self.backup_key) {
                warn!(error = %remove_err, "failed to drop stale recent metrics backup");
            }
            return Err(err);
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Option<Vec<MetricRecord>> {
        let payload = match self.medium.get(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "failed to read recent metrics");
                return None;
            }
        };

        let json = match self.codec.decode(&payload) {
            Ok(json) => json,
            Err(err) => {
                warn!(key, error = %err, "failed to decode recent metrics payload");
                return None;
            }
        };

        match serde_json::from_str::<Vec<MetricRecord>>(&json) {
            Ok(mut records) => {
                records.sort_by_key(|record| record.timestamp);
                Some(records)
            }
            Err(err) => {
                warn!(key, error = %err, "recent metrics payload is corrupt");
                None
            }
        }
    }
}

impl RecentMetricStore for BoundedJsonStore {
    fn save(&self, records: &[MetricRecord]) {
        let outcome = self.persist(records);
        debug!(?outcome, "recent metrics saved");
    }

    fn load(&self) -> Vec<MetricRecord> {
        if let Some(records) = self.read(&self.primary_key) {
            return records;
        }
        if let Some(records) = self.read(&self.backup_key) {
            debug!(records = records.len(), "recent metrics restored from backup");
            return records;
        }
        Vec::new()
    }

    fn clear(&self) {
        for key in [&self.primary_key, &self.backup_key] {
            if let Err(err) = self.medium.remove(key) {
                warn!(key = %key, error = %err, "failed to remove recent metrics");
            }
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
