//! Scenario drivers
//!
//! A scenario is a factory for drivers. A driver is a resumable command
//! producer: every call to [`Driver::resume`] consumes the result of the
//! previously requested action and yields exactly one new [`Action`]. The
//! harness owns the driver between steps, so a second action can never be
//! issued before the first one completes.

mod args;
mod builtin;
mod registry;

pub use args::ScenarioArg;
pub use builtin::{BASIC, CONNECT_AND_IDLE, ConnectAndIdle, NOTIFY_REPEAT, PushScenario};
pub use registry::ScenarioRegistry;

use std::time::Duration;
use thiserror::Error;

use crate::metrics::MetricsHandle;
use crate::notify::{NotificationRequest, NotificationResult};
use crate::transport::TransportError;

/// Errors raised while resolving or instantiating a scenario
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Missing function designation in '{0}' (expected <module>:<function>)")]
    MissingFunction(String),

    #[error("Scenario not found: {0}")]
    NotFound(String),

    #[error("Invalid argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },
}

/// The next thing a driver wants the harness to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Queue for a transport connection; answered with `Input::Connected`
    Connect,
    /// Send a text frame on the connection; answered with `Input::Sent`
    Send(String),
    /// Wait for the next text frame; answered with `Input::Received`
    Receive { timeout: Option<Duration> },
    /// POST a notification; answered with `Input::Notification`
    SendNotification(NotificationRequest),
    /// Sleep; answered with `Input::Waited`
    Wait(Duration),
    /// Close the connection if any; answered with `Input::Disconnected`
    Disconnect,
    /// Terminate this instance; the driver is never resumed again
    Finished,
}

/// The result of the previously requested action
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// First resumption, before any action
    Start,
    Connected,
    Sent(Result<(), TransportError>),
    /// `Ok(None)` when the receive timeout elapsed
    Received(Result<Option<String>, TransportError>),
    Notification(NotificationResult),
    Waited,
    Disconnected,
}

/// One running scenario script
pub trait Driver: Send {
    fn resume(&mut self, input: Input) -> Action;
}

/// Handles a driver receives from its harness
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    pub metrics: MetricsHandle,
}

/// Factory for drivers of one scenario
pub trait Scenario: Send + Sync {
    fn create(
        &self,
        args: &[ScenarioArg],
        ctx: ScenarioContext,
    ) -> Result<Box<dyn Driver>, ScenarioError>;
}
