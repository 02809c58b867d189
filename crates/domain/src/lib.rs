//! # Callstats Domain
//!
//! Business domain types and models for call telemetry.
//!
//! This crate contains:
//! - The `MetricRecord` entity and its enumerations
//! - Aggregation result types (scalar, grouped and time-bucketed rollups)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other callstats crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
