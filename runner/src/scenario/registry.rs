//! Scenario lookup by locator
//!
//! Locators have the form `<module path>:<function>`, for example
//! `pushload.scenarios:basic`. Scenarios are compiled in, so resolution goes
//! through this registry rather than a dynamic import.

use std::collections::HashMap;
use std::sync::Arc;

use super::builtin::{BASIC, CONNECT_AND_IDLE, ConnectAndIdle, NOTIFY_REPEAT, PushScenario};
use super::{Scenario, ScenarioError};

#[derive(Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: HashMap<String, Arc<dyn Scenario>>,
}

impl ScenarioRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in scenarios
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(BASIC, Arc::new(PushScenario::basic()));
        registry.register(NOTIFY_REPEAT, Arc::new(PushScenario::repeat()));
        registry.register(CONNECT_AND_IDLE, Arc::new(ConnectAndIdle));
        registry
    }

    /// Add or replace a scenario under `locator`
    pub fn register(&mut self, locator: impl Into<String>, scenario: Arc<dyn Scenario>) {
        self.scenarios.insert(locator.into(), scenario);
    }

    /// Resolve a locator
    pub fn locate(&self, locator: &str) -> Result<Arc<dyn Scenario>, ScenarioError> {
        let locator = locator.trim();
        if !locator.contains(':') {
            return Err(ScenarioError::MissingFunction(locator.to_string()));
        }
        self.scenarios
            .get(locator)
            .cloned()
            .ok_or_else(|| ScenarioError::NotFound(locator.to_string()))
    }

    /// Registered locators, sorted
    pub fn locators(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scenarios.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
