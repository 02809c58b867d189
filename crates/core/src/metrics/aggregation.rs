//! Aggregation engine
//!
//! Turns a window label into scalar, grouped and time-bucketed rollups.
//! [`aggregate`] is pure; [`AggregationEngine`] only adds the fetch.

use std::collections::BTreeMap;
use std::sync::Arc;

use callstats_domain::constants::{MS_PER_DAY, MS_PER_HOUR};
use callstats_domain::{
    AggregatedMetrics, DailyBucket, HourlyBucket, MetricRecord, ModelStats, ProviderCostBreakdown,
    ProviderStats, ResolvedRange, Result, TimeRange,
};
use chrono::{DateTime, Timelike};
use tracing::{debug, warn};

use super::coordinator::StorageCoordinator;
use super::stats::RollupAccumulator;

/// Reads records through the coordinator and aggregates them.
pub struct AggregationEngine {
    coordinator: Arc<StorageCoordinator>,
}

impl AggregationEngine {
    /// Engine reading through `coordinator`.
    pub fn new(coordinator: Arc<StorageCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Aggregate every record inside `range`, resolved against the
    /// coordinator's clock.
    ///
    /// An empty window yields [`AggregatedMetrics::empty`]. When the durable
    /// store is unavailable the recency window is aggregated instead; any
    /// other durable failure is returned.
    pub async fn get_aggregated_metrics(&self, range: TimeRange) -> Result<AggregatedMetrics> {
        let window = range.resolve(self.coordinator.now_ms());

        let fetched = match window {
            Some(w) => self.coordinator.get_metrics_in_range(w.start, w.end).await,
            None => self.coordinator.get_all_metrics().await,
        };

        let records = match fetched {
            Ok(records) => records,
            Err(err) if err.is_unavailable() => {
                warn!(range = %range, error = %err, "durable store unavailable; aggregating recent records");
                self.coordinator.recent_window(window).await
            }
            Err(err) => return Err(err),
        };

        debug!(range = %range, records = records.len(), "aggregating metrics");
        Ok(aggregate(&records, range, window))
    }
}

/// Aggregate `records` for the given window.
///
/// Records outside `window` are ignored; `None` means every record counts.
/// Groups and buckets are only emitted when they hold at least one call.
pub fn aggregate(
    records: &[MetricRecord],
    range: TimeRange,
    window: Option<ResolvedRange>,
) -> AggregatedMetrics {
    let mut overall = RollupAccumulator::new();
    let mut providers: BTreeMap<String, RollupAccumulator> = BTreeMap::new();
    let mut models: BTreeMap<String, (String, String, RollupAccumulator)> = BTreeMap::new();
    let mut by_input_format: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
    let mut hours: BTreeMap<i64, BucketAccumulator> = BTreeMap::new();
    let mut days: BTreeMap<i64, BucketAccumulator> = BTreeMap::new();

    let in_window = records
        .iter()
        .filter(|record| window.map_or(true, |w| w.contains(record.timestamp)));

    for record in in_window {
        overall.push(record);
        providers.entry(record.provider.clone()).or_default().push(record);
        models
            .entry(format!("{}/{}", record.provider, record.model))
            .or_insert_with(|| {
                (record.provider.clone(), record.model.clone(), RollupAccumulator::new())
            })
            .2
            .push(record);
        *by_input_format.entry(record.input_format.to_string()).or_insert(0) += 1;
        *by_status.entry(record.status.to_string()).or_insert(0) += 1;

        hours.entry(bucket_start(record.timestamp, MS_PER_HOUR)).or_default().push(record);
        days.entry(bucket_start(record.timestamp, MS_PER_DAY)).or_default().push(record);
    }

    if overall.total() == 0 {
        return AggregatedMetrics::empty(range, window);
    }

    let timeout_count = overall.timeouts();
    let (summary, percentiles) = overall.finish();

    let by_provider = providers
        .into_iter()
        .map(|(provider, acc)| {
            let (rollup, _) = acc.finish();
            (provider.clone(), ProviderStats { provider, rollup })
        })
        .collect();

    let by_model = models
        .into_iter()
        .map(|(key, (provider, model, acc))| {
            let (rollup, percentiles) = acc.finish();
            (key, ModelStats { provider, model, rollup, percentiles })
        })
        .collect();

    let hourly = hours.into_iter().map(|(start, acc)| acc.into_hourly(start)).collect();
    let daily = days.into_iter().map(|(start, acc)| acc.into_daily(start)).collect();

    AggregatedMetrics {
        range,
        window,
        summary,
        timeout_count,
        percentiles,
        by_provider,
        by_model,
        by_input_format,
        by_status,
        hourly,
        daily,
    }
}

fn bucket_start(timestamp: i64, width: i64) -> i64 {
    timestamp - timestamp.rem_euclid(width)
}

/// `(YYYY-MM-DD, hour)` in UTC for a bucket start.
fn calendar_labels(start: i64) -> (String, u32) {
    DateTime::from_timestamp_millis(start).map_or_else(
        || (String::new(), 0),
        |at| (at.format("%Y-%m-%d").to_string(), at.hour()),
    )
}

#[derive(Debug, Default)]
struct BucketAccumulator {
    calls: u64,
    successes: u64,
    tokens: u64,
    latency_sum: u128,
    cost: f64,
    by_provider: BTreeMap<String, ProviderCostBreakdown>,
}

impl BucketAccumulator {
    fn push(&mut self, record: &MetricRecord) {
        self.calls += 1;
        if record.status.is_success() {
            self.successes += 1;
        }
        self.tokens = self.tokens.saturating_add(record.tokens_used);
        self.latency_sum += u128::from(record.latency);
        self.cost += record.estimated_cost;

        let provider = self.by_provider.entry(record.provider.clone()).or_default();
        provider.calls += 1;
        provider.cost += record.estimated_cost;
        provider.tokens = provider.tokens.saturating_add(record.tokens_used);
    }

    // Buckets only exist once a record was pushed, so `calls > 0`.
    #[allow(clippy::cast_precision_loss)]
    fn rates(&self) -> (f64, f64) {
        let calls = self.calls.max(1) as f64;
        (self.latency_sum as f64 / calls, self.successes as f64 / calls)
    }

    fn into_hourly(self, start: i64) -> HourlyBucket {
        let (date, hour) = calendar_labels(start);
        let (avg_latency, success_rate) = self.rates();

        HourlyBucket {
            key: format!("{date}T{hour:02}"),
            date,
            hour,
            timestamp: start,
            calls: self.calls,
            tokens: self.tokens,
            avg_latency,
            cost: self.cost,
            success_rate,
        }
    }

    fn into_daily(self, start: i64) -> DailyBucket {
        let (date, _) = calendar_labels(start);
        let (avg_latency, success_rate) = self.rates();

        DailyBucket {
            date,
            timestamp: start,
            calls: self.calls,
            tokens: self.tokens,
            avg_latency,
            cost: self.cost,
            success_rate,
            by_provider: self.by_provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callstats_domain::{CallStatus, InputFormat, NewMetricRecord};

    // 2025-01-02T09:30:00Z
    const NOW: i64 = 1_735_810_200_000;

    fn record(id: &str, timestamp: i64, provider: &str, status: CallStatus, latency: u64) -> MetricRecord {
        NewMetricRecord::new(timestamp, provider, "model-a", status, latency)
            .with_tokens(10, 5)
            .with_cost(0.25)
            .into_record(id)
    }

    #[test]
    fn bucket_start_floors_negative_timestamps() {
        assert_eq!(bucket_start(-1, MS_PER_HOUR), -MS_PER_HOUR);
        assert_eq!(bucket_start(NOW, MS_PER_HOUR), 1_735_808_400_000);
    }

    #[test]
    fn hourly_keys_do_not_collide_across_days() {
        let records = vec![
            record("a", NOW, "OpenAI", CallStatus::Success, 100),
            record("b", NOW + MS_PER_DAY, "OpenAI", CallStatus::Success, 100),
        ];

        let result = aggregate(&records, TimeRange::All, None);

        assert_eq!(result.hourly.len(), 2);
        assert_eq!(result.hourly[0].key, "2025-01-02T09");
        assert_eq!(result.hourly[1].key, "2025-01-03T09");
        assert_eq!(result.hourly[0].hour, 9);
        assert_eq!(result.daily.len(), 2);
        assert_eq!(result.daily[0].date, "2025-01-02");
    }

    #[test]
    fn buckets_are_sparse_and_ascending() {
        let records = vec![
            record("late", NOW + 5 * MS_PER_HOUR, "OpenAI", CallStatus::Success, 100),
            record("early", NOW, "Anthropic", CallStatus::Error, 300),
            record("early-2", NOW + 60_000, "OpenAI", CallStatus::Success, 200),
        ];

        let result = aggregate(&records, TimeRange::All, None);

        let starts: Vec<i64> = result.hourly.iter().map(|b| b.timestamp).collect();
        assert_eq!(starts, vec![1_735_808_400_000, 1_735_808_400_000 + 5 * MS_PER_HOUR]);

        let first = &result.hourly[0];
        assert_eq!(first.calls, 2);
        assert_eq!(first.tokens, 30);
        assert!((first.avg_latency - 250.0).abs() < f64::EPSILON);
        assert!((first.success_rate - 0.5).abs() < f64::EPSILON);

        assert_eq!(result.daily.len(), 1);
        let day = &result.daily[0];
        assert_eq!(day.calls, 3);
        assert_eq!(day.by_provider["OpenAI"].calls, 2);
        assert_eq!(day.by_provider["OpenAI"].tokens, 30);
        assert!((day.by_provider["Anthropic"].cost - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn window_filters_records() {
        let records = vec![
            record("old", NOW - 2 * MS_PER_HOUR, "OpenAI", CallStatus::Success, 100),
            record("new", NOW - 60_000, "OpenAI", CallStatus::Timeout, 100),
        ];
        let window = TimeRange::Hour.resolve(NOW);

        let result = aggregate(&records, TimeRange::Hour, window);

        assert_eq!(result.summary.total_calls, 1);
        assert_eq!(result.timeout_count, 1);
        assert_eq!(result.by_status.get("timeout"), Some(&1));
        assert_eq!(result.window, window);
    }

    #[test]
    fn groups_by_model_and_input_format() {
        let mut image = record("img", NOW, "OpenAI", CallStatus::Success, 40);
        image.input_format = InputFormat::Image;
        image.model = "model-b".into();
        let records = vec![image, record("txt", NOW, "OpenAI", CallStatus::Success, 60)];

        let result = aggregate(&records, TimeRange::All, None);

        assert_eq!(result.by_model.len(), 2);
        let model_b = &result.by_model["OpenAI/model-b"];
        assert_eq!(model_b.model, "model-b");
        assert_eq!(model_b.percentiles.p99_latency, 40);
        assert_eq!(result.by_input_format.get("image"), Some(&1));
        assert_eq!(result.by_input_format.get("text"), Some(&1));
    }

    #[test]
    fn no_records_in_window_is_empty() {
        let records = vec![record("old", 0, "OpenAI", CallStatus::Success, 100)];
        let window = TimeRange::Today.resolve(NOW);

        let result = aggregate(&records, TimeRange::Today, window);

        assert!(result.is_empty());
        assert_eq!(result, AggregatedMetrics::empty(TimeRange::Today, window));
    }
}
