//! Aggregation through the engine and the coordinator.

mod support;

use callstats_core::{aggregate, AggregationEngine};
use callstats_domain::constants::MS_PER_HOUR;
use callstats_domain::{CallStatsError, CallStatus, TimeRange};
use support::{coordinator_at, metric, stored, FailMode, FakeDurableStore, MemoryRecentStore};

// 2025-01-02T09:30:00Z
const NOW: i64 = 1_735_810_200_000;

#[tokio::test]
async fn empty_tiers_yield_the_empty_aggregation() {
    let coordinator = coordinator_at(NOW, FakeDurableStore::new(), MemoryRecentStore::new(100));
    let engine = AggregationEngine::new(coordinator);

    for range in [
        TimeRange::Hour,
        TimeRange::Today,
        TimeRange::Week,
        TimeRange::Month,
        TimeRange::Year,
        TimeRange::All,
    ] {
        let result = engine.get_aggregated_metrics(range).await.expect("aggregation succeeds");

        assert_eq!(result.summary.total_calls, 0);
        assert_eq!(result.summary.success_rate, 0.0);
        assert!(result.by_provider.is_empty());
        assert!(result.by_model.is_empty());
        assert!(result.hourly.is_empty());
        assert!(result.daily.is_empty());
        assert_eq!(result.range, range);
    }
}

#[tokio::test]
async fn three_record_rollup() {
    let coordinator = coordinator_at(NOW, FakeDurableStore::new(), MemoryRecentStore::new(100));
    coordinator.save_metric(metric(NOW - 3_000, "OpenAI", CallStatus::Success, 100)).await.unwrap();
    coordinator.save_metric(metric(NOW - 2_000, "OpenAI", CallStatus::Success, 200)).await.unwrap();
    coordinator.save_metric(metric(NOW - 1_000, "Anthropic", CallStatus::Error, 300)).await.unwrap();
    let engine = AggregationEngine::new(coordinator);

    let result = engine.get_aggregated_metrics(TimeRange::All).await.unwrap();

    assert_eq!(result.summary.total_calls, 3);
    assert!((result.summary.success_rate - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(result.summary.failure_count, 1);
    assert_eq!(result.summary.min_latency, 100);
    assert_eq!(result.summary.max_latency, 300);
    assert_eq!(result.percentiles.p50_latency, 200);
    assert_eq!(result.percentiles.p95_latency, 300);

    assert_eq!(result.by_provider["OpenAI"].rollup.total_calls, 2);
    assert_eq!(result.by_provider["Anthropic"].rollup.success_rate, 0.0);
    assert_eq!(result.by_model["OpenAI/model-a"].percentiles.p50_latency, 100);
    assert_eq!(result.by_status.get("error"), Some(&1));
    assert!(result.window.is_none());
}

#[tokio::test]
async fn window_is_resolved_against_the_clock() {
    let durable = FakeDurableStore::new();
    durable.seed(vec![
        stored("inside", NOW - 10 * 60_000, "OpenAI", CallStatus::Success, 10),
        stored("outside", NOW - 2 * MS_PER_HOUR, "OpenAI", CallStatus::Success, 10),
    ]);
    let engine = AggregationEngine::new(coordinator_at(NOW, durable, MemoryRecentStore::new(100)));

    let hour = engine.get_aggregated_metrics(TimeRange::Hour).await.unwrap();
    assert_eq!(hour.summary.total_calls, 1);

    let today = engine.get_aggregated_metrics(TimeRange::Today).await.unwrap();
    assert_eq!(today.summary.total_calls, 2);
    assert_eq!(today.window.map(|w| w.start), Some(1_735_776_000_000));
}

#[tokio::test]
async fn unavailable_durable_store_falls_back_to_recent_records() {
    let durable = FakeDurableStore::new();
    let coordinator = coordinator_at(NOW, durable.clone(), MemoryRecentStore::new(100));
    coordinator.save_metric(metric(NOW - 1_000, "OpenAI", CallStatus::Success, 50)).await.unwrap();
    durable.set_mode(FailMode::Unavailable);
    let engine = AggregationEngine::new(coordinator);

    let result = engine.get_aggregated_metrics(TimeRange::Hour).await.unwrap();

    assert_eq!(result.summary.total_calls, 1);
}

#[tokio::test]
async fn other_durable_failures_are_returned() {
    let durable = FakeDurableStore::with_mode(FailMode::Database);
    let engine = AggregationEngine::new(coordinator_at(NOW, durable, MemoryRecentStore::new(100)));

    let err = engine.get_aggregated_metrics(TimeRange::All).await.unwrap_err();

    assert!(matches!(err, CallStatsError::Database(_)));
}

#[test]
fn pure_aggregation_matches_engine_output_shape() {
    let records = vec![
        stored("a", NOW, "OpenAI", CallStatus::Success, 100),
        stored("b", NOW, "OpenAI", CallStatus::Timeout, 900),
    ];

    let result = aggregate(&records, TimeRange::All, None);

    assert_eq!(result.timeout_count, 1);
    assert_eq!(result.summary.failure_count, 1);
    assert_eq!(result.hourly.len(), 1);
    assert_eq!(result.daily.len(), 1);
    assert!((result.daily[0].success_rate - 0.5).abs() < f64::EPSILON);
}
