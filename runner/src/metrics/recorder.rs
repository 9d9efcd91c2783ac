//! Sink backed by the `metrics` facade
//!
//! Samples go to whichever global recorder the host installed (the binary
//! installs the Prometheus exporter when a listen address is configured).
//! Without a recorder every sample is a no-op.

use metrics::{counter, histogram};

use super::MetricsSink;

pub struct RecorderSink {
    namespace: String,
}

impl RecorderSink {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.replace('.', "_")
        } else {
            format!("{}_{}", self.namespace, name.replace('.', "_"))
        }
    }
}

impl MetricsSink for RecorderSink {
    fn timing(&self, name: &str, millis: u64) {
        histogram!(format!("{}_ms", self.key(name))).record(millis as f64);
    }

    fn increment(&self, name: &str, count: u64) {
        counter!(format!("{}_total", self.key(name))).increment(count);
    }
}
