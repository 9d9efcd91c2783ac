//! pushload runner library
//!
//! This module exports the load-generation engine for use by the `pushload`
//! binary and integration tests.

pub mod config;
pub mod harness;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod protocol;
pub mod scenario;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use harness::{HarnessStats, RunHarness, Services};
pub use lifecycle::{Completion, wait_for_completion};
pub use crate::metrics::MetricsHandle;
pub use scenario::{Action, Driver, Input, Scenario, ScenarioArg, ScenarioRegistry};
pub use scheduler::{LoadScheduler, PlanError, TestPlanEntry, parse_testplan};
pub use transport::Endpoint;
