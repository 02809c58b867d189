//! # Callstats Infrastructure
//!
//! Infrastructure implementations of the core storage ports.
//!
//! This crate contains:
//! - The durable SQLite metric store (r2d2 pool, lazy initialisation)
//! - The bounded JSON recent store and its storage media
//! - The retention sweeper
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `callstats-core`
//! - Contains all "impure" code (file system, database)

pub mod config;
pub mod context;
pub mod database;
pub mod errors;
pub mod observability;
pub mod recent;
pub mod scheduling;

// Re-export commonly used items
pub use context::MetricsContext;
pub use database::{DbManager, SqliteMetricStore};
pub use errors::InfraError;
pub use observability::init_tracing;
pub use recent::{build_recent_store, BoundedJsonStore, FileMedium, MemoryMedium, StorageMedium};
pub use scheduling::{RetentionSweeper, SchedulerError, SweepReport, SweeperConfig};
