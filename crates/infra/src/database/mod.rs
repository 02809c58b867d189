//! Database implementations

pub mod manager;
pub mod metric_record_repository;

pub use manager::*;
pub use metric_record_repository::*;
