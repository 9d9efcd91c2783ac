//! Test-plan parsing
//!
//! A plan is a `|`-separated list of entries, each a `,`-separated list of
//! fields: `scenario, quantity, stagger, delay, *args`. Every entry is fully
//! validated here, so a bad plan never launches a single instance.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::scenario::{Scenario, ScenarioArg, ScenarioError, ScenarioRegistry};

/// Longest span, in seconds, an entry's launches may cover, delay included
pub const MAX_SCHEDULE_SECS: u64 = u32::MAX as u64;

/// Test-plan errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Test plan has no entries")]
    Empty,

    #[error("Entry {entry}: expected scenario, quantity, stagger and delay, got {found} field(s)")]
    MissingField { entry: usize, found: usize },

    #[error("Entry {entry}: invalid {field} '{value}'")]
    InvalidNumber {
        entry: usize,
        field: &'static str,
        value: String,
    },

    #[error("Entry {entry}: stagger must be greater than zero")]
    ZeroStagger { entry: usize },

    #[error("Entry {entry}: delay of {delay}s plus {iterations} batch(es) is too long to schedule")]
    ScheduleTooLong {
        entry: usize,
        delay: u64,
        iterations: u64,
    },

    #[error("Entry {entry}: {source}")]
    Scenario {
        entry: usize,
        #[source]
        source: ScenarioError,
    },
}

/// One scenario population in a plan
#[derive(Clone)]
pub struct TestPlanEntry {
    pub locator: String,
    pub scenario: Arc<dyn Scenario>,
    /// Total instances to launch, before truncation to a multiple of `stagger`
    pub quantity: u64,
    /// Instances launched per second
    pub stagger: u64,
    pub delay: Duration,
    pub args: Vec<ScenarioArg>,
}

impl TestPlanEntry {
    /// Number of one-second batches this entry launches
    pub fn iterations(&self) -> u64 {
        self.quantity / self.stagger
    }

    /// Instances actually launched once the remainder is dropped
    pub fn launched(&self) -> u64 {
        self.iterations() * self.stagger
    }
}

impl fmt::Debug for TestPlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestPlanEntry")
            .field("locator", &self.locator)
            .field("quantity", &self.quantity)
            .field("stagger", &self.stagger)
            .field("delay", &self.delay)
            .field("args", &self.args)
            .finish()
    }
}

/// Parse a test plan, resolving every scenario through `registry`
pub fn parse_testplan(
    plan: &str,
    registry: &ScenarioRegistry,
) -> Result<Vec<TestPlanEntry>, PlanError> {
    let entries = plan
        .split('|')
        .filter(|segment| !segment.trim().is_empty())
        .enumerate()
        .map(|(i, segment)| parse_entry(i + 1, segment, registry))
        .collect::<Result<Vec<_>, _>>()?;

    if entries.is_empty() {
        return Err(PlanError::Empty);
    }
    Ok(entries)
}

fn parse_entry(
    entry: usize,
    segment: &str,
    registry: &ScenarioRegistry,
) -> Result<TestPlanEntry, PlanError> {
    let fields: Vec<&str> = segment.split(',').map(str::trim).collect();
    if fields.len() < 4 {
        return Err(PlanError::MissingField {
            entry,
            found: fields.len(),
        });
    }

    let locator = fields[0].to_string();
    let scenario = registry
        .locate(&locator)
        .map_err(|source| PlanError::Scenario { entry, source })?;

    let quantity = number(entry, "quantity", fields[1])?;
    let stagger = number(entry, "stagger", fields[2])?;
    let delay = number(entry, "delay", fields[3])?;
    if stagger == 0 {
        return Err(PlanError::ZeroStagger { entry });
    }
    let iterations = quantity / stagger;
    if delay
        .checked_add(iterations)
        .is_none_or(|end| end > MAX_SCHEDULE_SECS)
    {
        return Err(PlanError::ScheduleTooLong {
            entry,
            delay,
            iterations,
        });
    }

    let parsed = TestPlanEntry {
        locator,
        scenario,
        quantity,
        stagger,
        delay: Duration::from_secs(delay),
        args: ScenarioArg::parse_all(&fields[4..]),
    };

    let dropped = parsed.quantity - parsed.launched();
    if dropped > 0 {
        warn!(
            "Entry {} ({}): quantity {} is not a multiple of stagger {}; {} instance(s) will not be launched",
            entry, parsed.locator, parsed.quantity, parsed.stagger, dropped
        );
    }

    Ok(parsed)
}

fn number(entry: usize, field: &'static str, value: &str) -> Result<u64, PlanError> {
    value.parse().map_err(|_| PlanError::InvalidNumber {
        entry,
        field,
        value: value.to_string(),
    })
}
