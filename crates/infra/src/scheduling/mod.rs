//! Scheduling infrastructure for background maintenance
//!
//! Schedulers follow the same runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on every job run

pub mod error;
pub mod retention_sweeper;

pub use error::{SchedulerError, SchedulerResult};
pub use retention_sweeper::{RetentionSweeper, SweepReport, SweeperConfig};
