//! Metric persistence and aggregation
//!
//! Writes flow through [`coordinator::StorageCoordinator`] into the recency
//! store (Tier A) and the durable store (Tier B). Reads for rollups go
//! through [`aggregation::AggregationEngine`].

pub mod aggregation;
pub mod coordinator;
pub mod events;
pub mod ports;
pub mod stats;
