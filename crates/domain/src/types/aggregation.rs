//! Aggregation result types
//!
//! Everything the reporting layer renders is expressed here. All rates are
//! fractions in `0.0..=1.0`, never percentages. Groups and buckets are only
//! present when they contain at least one call, so no field is ever NaN.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::range::{ResolvedRange, TimeRange};

/* -------------------------------------------------------------------------- */
/* Scalar rollups */
/* -------------------------------------------------------------------------- */

/// Scalar statistics over a set of calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRollup {
    pub total_calls: u64,
    pub success_count: u64,
    /// Every call whose status is not `success` (errors and timeouts)
    pub failure_count: u64,
    pub success_rate: f64,
    pub avg_latency: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub avg_tokens_per_call: f64,
    pub total_cost: f64,
    pub avg_cost_per_call: f64,
}

/// Nearest-rank latency percentiles in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyPercentiles {
    pub p50_latency: u64,
    pub p95_latency: u64,
    pub p99_latency: u64,
}

/* -------------------------------------------------------------------------- */
/* Grouped rollups */
/* -------------------------------------------------------------------------- */

/// Rollup for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub provider: String,
    #[serde(flatten)]
    pub rollup: CallRollup,
}

/// Rollup for a `(provider, model)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub provider: String,
    pub model: String,
    #[serde(flatten)]
    pub rollup: CallRollup,
    #[serde(flatten)]
    pub percentiles: LatencyPercentiles,
}

/* -------------------------------------------------------------------------- */
/* Time buckets */
/* -------------------------------------------------------------------------- */

/// Calls within one calendar hour (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    /// `YYYY-MM-DDTHH`, unique across days
    pub key: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub hour: u32,
    /// Bucket start, epoch milliseconds
    pub timestamp: i64,
    pub calls: u64,
    pub tokens: u64,
    pub avg_latency: f64,
    pub cost: f64,
    pub success_rate: f64,
}

/// Per-provider spend inside a daily bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCostBreakdown {
    pub calls: u64,
    pub cost: f64,
    pub tokens: u64,
}

/// Calls within one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Bucket start, epoch milliseconds
    pub timestamp: i64,
    pub calls: u64,
    pub tokens: u64,
    pub avg_latency: f64,
    pub cost: f64,
    pub success_rate: f64,
    pub by_provider: BTreeMap<String, ProviderCostBreakdown>,
}

/* -------------------------------------------------------------------------- */
/* Aggregation */
/* -------------------------------------------------------------------------- */

/// Full aggregation for a reporting window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub range: TimeRange,
    /// Resolved window, `None` for a full scan
    pub window: Option<ResolvedRange>,
    #[serde(flatten)]
    pub summary: CallRollup,
    pub timeout_count: u64,
    #[serde(flatten)]
    pub percentiles: LatencyPercentiles,
    pub by_provider: BTreeMap<String, ProviderStats>,
    /// Keyed `provider/model`
    pub by_model: BTreeMap<String, ModelStats>,
    pub by_input_format: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
    /// Sorted ascending by bucket start
    pub hourly: Vec<HourlyBucket>,
    /// Sorted ascending by bucket start
    pub daily: Vec<DailyBucket>,
}

impl AggregatedMetrics {
    /// The well-defined result for a window without records.
    pub fn empty(range: TimeRange, window: Option<ResolvedRange>) -> Self {
        Self { range, window, ..Self::default() }
    }

    /// True when no calls were aggregated.
    pub fn is_empty(&self) -> bool {
        self.summary.total_calls == 0
    }
}

/* -------------------------------------------------------------------------- */
/* Storage status */
/* -------------------------------------------------------------------------- */

/// Health of the two storage tiers as seen by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    /// Durable store finished initialising and accepts operations
    pub durable_ready: bool,
    /// Reason the durable store is unavailable, if it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durable_error: Option<String>,
    /// Records currently held by the recency store
    pub recent_count: usize,
}
