//! "Metric recorded" notifications.

use callstats_domain::constants::EVENT_METRIC_RECORDED;
use callstats_domain::MetricRecord;
use serde::Serialize;

/// Published after a record was persisted to the durable store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecordedEvent {
    pub record: MetricRecord,
}

impl MetricRecordedEvent {
    /// Event name used when forwarding to a UI event bus.
    pub const NAME: &'static str = EVENT_METRIC_RECORDED;

    /// Event announcing `record`.
    pub fn new(record: MetricRecord) -> Self {
        Self { record }
    }
}
