//! Nearest-rank statistics and the shared rollup accumulator.

use callstats_domain::{CallRollup, CallStatus, LatencyPercentiles, MetricRecord};

/// Nearest-rank percentile over an ascending slice.
///
/// Returns `sorted[max(0, ceil(n * p) - 1)]`; no interpolation, so the result
/// is always an observed value. `p` is clamped to `0.0..=1.0` and an empty
/// slice yields `0`.
///
/// # Examples
///
/// ```
/// use callstats_core::percentile;
///
/// assert_eq!(percentile(&[100, 100, 100, 100], 0.5), 100);
/// assert_eq!(percentile(&[10, 20, 30, 40, 50], 0.95), 50);
/// ```
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let rank = (sorted.len() as f64 * p).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}

/// Running totals for one group of records.
///
/// Every grouping in an aggregation (overall, per provider, per model) feeds
/// its records through one of these and calls [`finish`](Self::finish) once.
#[derive(Debug, Clone, Default)]
pub struct RollupAccumulator {
    total: u64,
    successes: u64,
    timeouts: u64,
    latency_sum: u128,
    latencies: Vec<u64>,
    total_tokens: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    cost: f64,
}

impl RollupAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the rollup.
    pub fn push(&mut self, record: &MetricRecord) {
        self.total += 1;
        if record.status.is_success() {
            self.successes += 1;
        }
        if record.status == CallStatus::Timeout {
            self.timeouts += 1;
        }
        self.latency_sum += u128::from(record.latency);
        self.latencies.push(record.latency);
        self.total_tokens = self.total_tokens.saturating_add(record.tokens_used);
        self.prompt_tokens = self.prompt_tokens.saturating_add(record.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(record.completion_tokens);
        self.cost += record.estimated_cost;
    }

    /// Calls seen so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Calls that timed out.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Produce the rollup and percentiles. An empty accumulator yields all
    /// zeros.
    pub fn finish(mut self) -> (CallRollup, LatencyPercentiles) {
        if self.total == 0 {
            return (CallRollup::default(), LatencyPercentiles::default());
        }

        self.latencies.sort_unstable();
        #[allow(clippy::cast_precision_loss)]
        let total = self.total as f64;

        #[allow(clippy::cast_precision_loss)]
        let rollup = CallRollup {
            total_calls: self.total,
            success_count: self.successes,
            failure_count: self.total - self.successes,
            success_rate: self.successes as f64 / total,
            avg_latency: self.latency_sum as f64 / total,
            min_latency: self.latencies[0],
            max_latency: self.latencies[self.latencies.len() - 1],
            total_tokens: self.total_tokens,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            avg_tokens_per_call: self.total_tokens as f64 / total,
            total_cost: self.cost,
            avg_cost_per_call: self.cost / total,
        };

        let percentiles = LatencyPercentiles {
            p50_latency: percentile(&self.latencies, 0.50),
            p95_latency: percentile(&self.latencies, 0.95),
            p99_latency: percentile(&self.latencies, 0.99),
        };

        (rollup, percentiles)
    }
}
