//! Shared helpers for infra integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use callstats_domain::{CallStatus, InputFormat, MetricRecord};
use callstats_infra::database::SqliteMetricStore;
use tempfile::TempDir;

/// Temporary directory that keeps the database file alive for a test.
pub struct StoreHarness {
    pub store: Arc<SqliteMetricStore>,
    pub db_path: PathBuf,
    _temp_dir: TempDir,
}

impl StoreHarness {
    pub fn new() -> Self {
        Self::with_pool_size(4)
    }

    pub fn with_pool_size(pool_size: u32) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("metrics.db");
        let store = Arc::new(SqliteMetricStore::new(&db_path, pool_size));

        Self { store, db_path, _temp_dir: temp_dir }
    }
}

impl Default for StoreHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fully populated record with a deterministic id.
pub fn record(id: &str, timestamp: i64, provider: &str, status: CallStatus) -> MetricRecord {
    MetricRecord {
        id: id.to_string(),
        timestamp,
        provider: provider.to_string(),
        model: format!("{}-model", provider.to_lowercase()),
        input_format: InputFormat::Text,
        status,
        latency: 120,
        tokens_used: 30,
        prompt_tokens: 20,
        completion_tokens: 10,
        estimated_cost: 0.002,
        prompt_length: 80,
        response_length: 40,
        error_message: None,
        confidence: Some(0.9),
    }
}

pub fn success(id: &str, timestamp: i64) -> MetricRecord {
    record(id, timestamp, "OpenAI", CallStatus::Success)
}
