//! Configuration structures
//!
//! Every section has defaults, so a config file only needs to mention the
//! values it overrides. Loading (environment, JSON, TOML) lives in the infra
//! crate.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_RECENT_BACKUP_KEY, DEFAULT_RECENT_CAPACITY,
    DEFAULT_RECENT_FALLBACK_CAPACITY, DEFAULT_RECENT_PRIMARY_KEY, DEFAULT_RETENTION_DAYS,
    DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_SWEEP_TIMEOUT_SECS, MS_PER_DAY,
};
use crate::errors::{CallStatsError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub recent: RecentStoreConfig,
    pub retention: RetentionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make a component unusable.
    pub fn validate(&self) -> Result<()> {
        if self.storage.path.trim().is_empty() {
            return Err(CallStatsError::Config("storage.path must not be empty".into()));
        }
        if self.storage.pool_size == 0 {
            return Err(CallStatsError::Config("storage.pool_size must be greater than 0".into()));
        }
        if self.recent.capacity == 0 {
            return Err(CallStatsError::Config("recent.capacity must be greater than 0".into()));
        }
        if self.recent.fallback_capacity > self.recent.capacity {
            return Err(CallStatsError::Config(format!(
                "recent.fallback_capacity ({}) must not exceed recent.capacity ({})",
                self.recent.fallback_capacity, self.recent.capacity
            )));
        }
        if self.recent.primary_key == self.recent.backup_key {
            return Err(CallStatsError::Config(
                "recent.primary_key and recent.backup_key must differ".into(),
            ));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(CallStatsError::Config(
                "retention.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Durable (SQLite) store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path; `:memory:` keeps everything in process
    pub path: String,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// Recency (JSON) store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentStoreConfig {
    /// Directory holding the payload files; `None` keeps them in memory
    pub directory: Option<PathBuf>,
    /// Maximum number of records kept
    pub capacity: usize,
    /// Records kept when even the compressed payload does not fit
    pub fallback_capacity: usize,
    /// Byte quota across both payloads; `None` means unbounded
    pub quota_bytes: Option<u64>,
    pub primary_key: String,
    pub backup_key: String,
}

impl Default for RecentStoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            capacity: DEFAULT_RECENT_CAPACITY,
            fallback_capacity: DEFAULT_RECENT_FALLBACK_CAPACITY,
            quota_bytes: None,
            primary_key: DEFAULT_RECENT_PRIMARY_KEY.to_string(),
            backup_key: DEFAULT_RECENT_BACKUP_KEY.to_string(),
        }
    }
}

/// Retention sweeper configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    /// Durable records older than this are purged
    pub horizon_days: u32,
    pub sweep_interval_secs: u64,
    pub sweep_timeout_secs: u64,
}

impl RetentionConfig {
    /// Retention horizon in milliseconds.
    pub fn horizon_ms(&self) -> i64 {
        i64::from(self.horizon_days) * MS_PER_DAY
    }

    /// Delay between sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Upper bound for one sweep.
    pub fn sweep_timeout(&self) -> Duration {
        Duration::from_secs(self.sweep_timeout_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            horizon_days: DEFAULT_RETENTION_DAYS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            sweep_timeout_secs: DEFAULT_SWEEP_TIMEOUT_SECS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().expect("default config validates");
        assert_eq!(config.recent.capacity, 100);
        assert_eq!(config.recent.fallback_capacity, 10);
        assert_eq!(config.retention.horizon_days, 90);
        assert_eq!(config.retention.sweep_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn fallback_larger_than_capacity_is_rejected() {
        let mut config = Config::default();
        config.recent.capacity = 5;
        assert!(matches!(config.validate(), Err(CallStatsError::Config(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "retention": { "horizon_days": 7 } }"#).expect("parses");
        assert_eq!(config.retention.horizon_days, 7);
        assert_eq!(config.retention.sweep_interval_secs, DEFAULT_SWEEP_INTERVAL_SECS);
        assert_eq!(config.storage.pool_size, DEFAULT_DB_POOL_SIZE);
    }

    #[test]
    fn horizon_converts_to_milliseconds() {
        let retention = RetentionConfig { horizon_days: 2, ..Default::default() };
        assert_eq!(retention.horizon_ms(), 2 * MS_PER_DAY);
    }
}
