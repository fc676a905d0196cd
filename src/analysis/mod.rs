//! Result aggregation module.
//!
//! Reduces per-image records into per-submitter summaries.

mod aggregator;

pub use aggregator::*;
