//! Domain types and models
//!
//! - [`metric`]: the `MetricRecord` entity recorded once per external call
//! - [`range`]: reporting windows resolved to absolute timestamps
//! - [`aggregation`]: rollup result types handed to the reporting layer

pub mod aggregation;
pub mod metric;
pub mod range;

pub use aggregation::{
    AggregatedMetrics, CallRollup, DailyBucket, HourlyBucket, LatencyPercentiles, ModelStats,
    ProviderCostBreakdown, ProviderStats, StorageStatus,
};
pub use metric::{CallStatus, Dimension, InputFormat, MetricRecord, NewMetricRecord};
pub use range::{ResolvedRange, TimeRange};
