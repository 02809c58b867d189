//! Recent-metrics store (Tier A)

pub mod compression;
pub mod json_store;
pub mod medium;

use std::sync::Arc;

use callstats_domain::{CallStatsError, RecentStoreConfig, Result};

pub use json_store::{BoundedJsonStore, SaveOutcome};
pub use medium::{FileMedium, MediumError, MemoryMedium, StorageMedium};

/// Build the recent store described by `config`.
///
/// Uses a [`FileMedium`] when a directory is configured, otherwise an
/// in-memory medium that lives as long as the process.
pub fn build_recent_store(config: &RecentStoreConfig) -> Result<BoundedJsonStore> {
    let medium: Arc<dyn StorageMedium> = match &config.directory {
        Some(dir) => Arc::new(FileMedium::open(dir, config.quota_bytes).map_err(|err| {
            CallStatsError::Storage(format!(
                "failed to open recent store at {}: {err}",
                dir.display()
            ))
        })?),
        None => match config.quota_bytes {
            Some(quota) => Arc::new(MemoryMedium::with_quota(quota)),
            None => Arc::new(MemoryMedium::new()),
        },
    };

    Ok(BoundedJsonStore::new(medium, config))
}
