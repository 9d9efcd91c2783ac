//! Test Utilities Module
//!
//! In-memory fakes for the harness collaborators: a recording metrics sink,
//! controllable connectors and connections, a canned notifier and a scripted
//! scenario. Only compiled when running tests.

#![cfg(test)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::metrics::MetricsSink;
use crate::notify::{NotificationRequest, NotificationResponse, NotificationResult, Notifier, NotifyError};
use crate::scenario::{Action, Driver, Input, Scenario, ScenarioArg, ScenarioContext, ScenarioError};
use crate::transport::{Connection, ConnectionId, Connector, Endpoint, TransportError};

// ============================================================================
// Metrics
// ============================================================================

/// Sink that keeps every sample in memory
#[derive(Default)]
pub struct RecordingSink {
    timings: Mutex<HashMap<String, Vec<u64>>>,
    counters: Mutex<HashMap<String, u64>>,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timings(&self, name: &str) -> Vec<u64> {
        self.timings.lock().unwrap().get(name).cloned().unwrap_or_default()
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counters.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl MetricsSink for RecordingSink {
    fn timing(&self, name: &str, millis: u64) {
        self.timings
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push(millis);
    }

    fn increment(&self, name: &str, count: u64) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default() += count;
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Transport
// ============================================================================

/// In-memory connection fed from a fixed list of frames
///
/// Once the frames run out, `recv` reports the peer as closed, or blocks
/// forever for a silent connection.
pub struct MockConnection {
    id: ConnectionId,
    incoming: VecDeque<String>,
    silent: bool,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl MockConnection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            incoming: VecDeque::new(),
            silent: false,
            sent: Arc::default(),
            closed: Arc::default(),
        }
    }

    /// Shared counter incremented on every `close`
    pub fn closed_counter(&self) -> Arc<AtomicUsize> {
        self.closed.clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        match self.incoming.pop_front() {
            Some(frame) => Ok(frame),
            None if self.silent => std::future::pending().await,
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectMode {
    /// Attempts never complete
    Pending,
    /// Attempts succeed after the configured number of refusals
    Accept,
}

/// Connector whose outcome is chosen up front
pub struct MockConnector {
    mode: ConnectMode,
    refusals: AtomicUsize,
    attempts: AtomicUsize,
    frames: Vec<String>,
    silent: bool,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl MockConnector {
    fn with_mode(mode: ConnectMode) -> Self {
        Self {
            mode,
            refusals: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            frames: Vec::new(),
            silent: false,
            sent: Arc::default(),
            closed: Arc::default(),
        }
    }

    /// Every attempt hangs forever
    pub fn pending() -> Self {
        Self::with_mode(ConnectMode::Pending)
    }

    /// Every attempt succeeds immediately
    pub fn accepting() -> Self {
        Self::with_mode(ConnectMode::Accept)
    }

    /// The first `count` attempts fail, the rest succeed
    pub fn refusing(count: usize) -> Self {
        let connector = Self::accepting();
        connector.refusals.store(count, Ordering::SeqCst);
        connector
    }

    /// Frames every new connection will deliver before closing
    pub fn with_frames(mut self, frames: Vec<String>) -> Self {
        self.frames = frames;
        self
    }

    /// Connections stay open and quiet once their frames are consumed
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of `close` calls across every connection handed out
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Frames sent across every connection handed out
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        _endpoint: &Endpoint,
        id: ConnectionId,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.mode == ConnectMode::Pending {
            std::future::pending::<()>().await;
        }

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        Ok(Box::new(MockConnection {
            id,
            incoming: self.frames.iter().cloned().collect(),
            silent: self.silent,
            sent: self.sent.clone(),
            closed: self.closed.clone(),
        }))
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Notifier returning a fixed status, or a request error when none is set
pub struct MockNotifier {
    status: Option<u16>,
    requests: Mutex<Vec<NotificationRequest>>,
}

impl MockNotifier {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            requests: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            status: None,
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn post(&self, request: NotificationRequest) -> NotificationResult {
        self.requests.lock().unwrap().push(request);
        match self.status {
            Some(status) => Ok(NotificationResponse {
                status,
                body: Bytes::new(),
            }),
            None => Err(NotifyError::Request("connection refused".to_string())),
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// Inputs seen by scripted drivers, keyed by creation order
pub type InputLog = Arc<Mutex<Vec<(usize, Input)>>>;

/// Scenario whose drivers replay a fixed list of actions
///
/// Each driver ignores its inputs (they are logged) and returns
/// `Action::Finished` once the script is exhausted.
pub struct ScriptedScenario {
    script: Vec<Action>,
    created: AtomicUsize,
    inputs: InputLog,
    reject: bool,
}

impl ScriptedScenario {
    pub fn new(script: Vec<Action>) -> Self {
        Self {
            script,
            created: AtomicUsize::new(0),
            inputs: Arc::default(),
            reject: false,
        }
    }

    /// Scenario whose `create` always fails
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new(vec![])
        }
    }

    /// Build a driver without going through `Scenario::create`
    pub fn driver(&self) -> Box<dyn Driver> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedDriver {
            index,
            script: self.script.iter().cloned().collect(),
            inputs: self.inputs.clone(),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<(usize, Input)> {
        self.inputs.lock().unwrap().clone()
    }
}

impl Scenario for ScriptedScenario {
    fn create(
        &self,
        _args: &[ScenarioArg],
        _ctx: ScenarioContext,
    ) -> Result<Box<dyn Driver>, ScenarioError> {
        if self.reject {
            return Err(ScenarioError::InvalidArgument {
                index: 0,
                reason: "rejected".to_string(),
            });
        }
        Ok(self.driver())
    }
}

struct ScriptedDriver {
    index: usize,
    script: VecDeque<Action>,
    inputs: InputLog,
}

impl Driver for ScriptedDriver {
    fn resume(&mut self, input: Input) -> Action {
        self.inputs.lock().unwrap().push((self.index, input));
        self.script.pop_front().unwrap_or(Action::Finished)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn settle(mut condition: impl FnMut() -> bool) {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), poll)
        .await
        .expect("condition not reached within 2s");
}
