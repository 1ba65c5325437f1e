//! Operational metrics contract.
//!
//! The engine emits its own counters (evaluations run, alerts fired, tasks
//! expired) through this narrow interface. The actual collector backend is an
//! external pass-through adapter; the default sink drops everything.

use std::sync::Arc;

/// Statsd-style sink for operational counters and timings.
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by `amount`.
    fn incr(&self, key: &str, amount: u64);

    /// Record a timing in milliseconds.
    fn timing(&self, key: &str, millis: u64);
}

/// Sink that discards all metrics. Used when no collector is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr(&self, _key: &str, _amount: u64) {}
    fn timing(&self, _key: &str, _millis: u64) {}
}

/// Shared handle to a metrics sink.
pub type SharedMetrics = Arc<dyn MetricsSink>;
