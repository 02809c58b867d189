//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Recent (fast) store
pub const DEFAULT_RECENT_CAPACITY: usize = 100;
pub const DEFAULT_RECENT_FALLBACK_CAPACITY: usize = 10;
pub const DEFAULT_RECENT_PRIMARY_KEY: &str = "callstats.recent";
pub const DEFAULT_RECENT_BACKUP_KEY: &str = "callstats.recent.backup";

// Retention
pub const DEFAULT_RETENTION_DAYS: u32 = 90;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SWEEP_TIMEOUT_SECS: u64 = 60;

// Durable store
pub const DEFAULT_DB_PATH: &str = "data/callstats.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;

// Time arithmetic (milliseconds)
pub const MS_PER_HOUR: i64 = 60 * 60 * 1000;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

// Notification channel
pub const EVENT_METRIC_RECORDED: &str = "metric-recorded";
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
