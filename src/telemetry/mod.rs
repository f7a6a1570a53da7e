//! Observability subsystem: counters, gauges, and snapshots.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
