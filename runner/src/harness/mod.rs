pub mod instance;
pub mod runner;
mod state;

pub use instance::{Instance, InstanceId};
pub use runner::{HarnessStats, RunHarness};

use std::sync::Arc;

use crate::metrics::MetricsHandle;
use crate::notify::Notifier;
use crate::transport::Connector;

/// Shared collaborators every harness of a run talks to
#[derive(Clone)]
pub struct Services {
    pub connector: Arc<dyn Connector>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: MetricsHandle,
}

impl Services {
    pub fn new(
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            connector,
            notifier,
            metrics,
        }
    }
}
