//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when `CALLSTATS_DB_PATH` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//! 3. Otherwise [`Config::default`]
//!
//! Files may be JSON or TOML (detected by extension). Every section is
//! defaulted, so a file only lists what it overrides.
//!
//! ## Environment Variables
//! - `CALLSTATS_DB_PATH`: Database file path (required for env loading)
//! - `CALLSTATS_DB_POOL_SIZE`: Connection pool size
//! - `CALLSTATS_RECENT_DIR`: Directory for the recent-metrics payloads
//! - `CALLSTATS_RECENT_CAPACITY`: Records kept by the recent store
//! - `CALLSTATS_RECENT_QUOTA_BYTES`: Byte quota for the recent payloads
//! - `CALLSTATS_RETENTION_DAYS`: Retention horizon in days
//! - `CALLSTATS_SWEEP_INTERVAL_SECS`: Seconds between retention sweeps
//! - `CALLSTATS_LOG_LEVEL`: Default log filter
//! - `CALLSTATS_LOG_JSON`: Emit JSON log lines (true/false)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use callstats_domain::{CallStatsError, Config, Result};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CallStatsError::Config` if a source exists but is invalid.
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            match probe_config_paths() {
                Some(path) => load_from_file(Some(path))?,
                None => {
                    tracing::info!("No config file found, using defaults");
                    Config::default()
                }
            }
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `CALLSTATS_DB_PATH` is required; every other variable falls back to its
/// default when unset.
///
/// # Errors
/// Returns `CallStatsError::Config` if the path is missing or a value does
/// not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.storage.path = env_var("CALLSTATS_DB_PATH")?;
    if let Some(pool_size) = env_parse::<u32>("CALLSTATS_DB_POOL_SIZE")? {
        config.storage.pool_size = pool_size;
    }

    if let Some(dir) = std::env::var_os("CALLSTATS_RECENT_DIR") {
        config.recent.directory = Some(PathBuf::from(dir));
    }
    if let Some(capacity) = env_parse::<usize>("CALLSTATS_RECENT_CAPACITY")? {
        config.recent.capacity = capacity;
        config.recent.fallback_capacity = config.recent.fallback_capacity.min(capacity);
    }
    if let Some(quota) = env_parse::<u64>("CALLSTATS_RECENT_QUOTA_BYTES")? {
        config.recent.quota_bytes = Some(quota);
    }

    if let Some(days) = env_parse::<u32>("CALLSTATS_RETENTION_DAYS")? {
        config.retention.horizon_days = days;
    }
    if let Some(secs) = env_parse::<u64>("CALLSTATS_SWEEP_INTERVAL_SECS")? {
        config.retention.sweep_interval_secs = secs;
    }

    if let Ok(level) = std::env::var("CALLSTATS_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("CALLSTATS_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `CallStatsError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CallStatsError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CallStatsError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CallStatsError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CallStatsError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CallStatsError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CallStatsError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Searches, in order:
/// 1. Current working directory (`./callstats.{json,toml}`,
///    `./config.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. The same names relative to the executable
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("callstats.json"),
        dir.join("callstats.toml"),
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("../callstats.json"),
        dir.join("../callstats.toml"),
        dir.join("../../callstats.json"),
        dir.join("../../callstats.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `CallStatsError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CallStatsError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional environment variable; unset yields `None`.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CallStatsError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
