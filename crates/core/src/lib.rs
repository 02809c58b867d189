//! # Callstats Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the recency and durable metric stores
//! - The storage coordinator that fans writes out to both tiers
//! - The aggregation engine and nearest-rank statistics
//!
//! ## Architecture Principles
//! - Only depends on `callstats-domain`
//! - No database, file system, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod metrics;

// Re-export specific items to avoid ambiguity
pub use metrics::aggregation::{aggregate, AggregationEngine};
pub use metrics::coordinator::{CoordinatorConfig, StorageCoordinator};
pub use metrics::events::MetricRecordedEvent;
pub use metrics::ports::{
    Clock, DurableMetricStore, FixedClock, RecentMetricStore, RetentionTarget, SystemClock,
};
pub use metrics::stats::{percentile, RollupAccumulator};
