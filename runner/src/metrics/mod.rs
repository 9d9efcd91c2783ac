//! Metrics sinks for timing samples and counters
//!
//! This module provides:
//! - `MetricsSink` trait, the fire-and-forget boundary every sample crosses
//! - `StatsdSink` for shipping samples to a StatsD collector over UDP
//! - `RecorderSink` for routing samples through the `metrics` facade
//! - `MetricsHandle`, the explicit handle threaded from the scheduler down to
//!   every harness and scenario driver

mod recorder;
mod statsd;

pub use recorder::RecorderSink;
pub use statsd::{MetricsError, StatsdSink};

use std::sync::Arc;
use std::time::Duration;

/// Destination for timing samples and counters
///
/// Implementations must never block and never surface failures to callers.
pub trait MetricsSink: Send + Sync {
    /// Record a timing sample in milliseconds
    fn timing(&self, name: &str, millis: u64);

    /// Increment a named counter
    fn increment(&self, name: &str, count: u64);

    /// Release any underlying transport; later samples are dropped
    fn close(&self) {}
}

/// Cloneable handle to the run's metrics sink
#[derive(Clone)]
pub struct MetricsHandle {
    sink: Arc<dyn MetricsSink>,
}

impl MetricsHandle {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    /// Record a timer sample
    pub fn timer(&self, name: &str, duration: Duration) {
        self.sink.timing(name, duration.as_millis() as u64);
    }

    /// Increment a counter
    pub fn counter(&self, name: &str, count: u64) {
        self.sink.increment(name, count);
    }

    /// Close the underlying sink
    pub fn close(&self) {
        self.sink.close();
    }
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHandle").finish_non_exhaustive()
    }
}
