//! Metrics sink for the txreplay RPC access layer.

mod sink;

pub use sink::{MetricsSink, Outcome, DURATION_BUCKETS};
