//! Result aggregation
//!
//! Turns the stream of completed suites into run-wide totals.

mod aggregator;

pub use aggregator::Aggregator;
