//! Run harness: executes every instance of one scenario against one endpoint
//!
//! Instances that ask for a connection wait in a FIFO queue. Each connect
//! request triggers one connection attempt, and whichever attempt completes
//! first is handed to the oldest waiter, so connections are interchangeable.
//! Attempts that fail are re-issued while anyone is still waiting.
//!
//! The harness is cheap to clone; clones share the same state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::Services;
use super::instance::Instance;
use super::state::{HarnessState, Release};
use crate::lifecycle::{Completion, LiveCounter};
use crate::metrics::MetricsHandle;
use crate::notify::NotificationRequest;
use crate::scenario::{Action, Input, Scenario, ScenarioArg, ScenarioContext};
use crate::transport::{Connection, ConnectionId, Endpoint, TransportError};

/// Point-in-time view of a harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarnessStats {
    /// Instances started and not yet finished
    pub live: usize,
    /// Instances queued for a connection
    pub waiting: usize,
    /// Connections currently serving an instance
    pub active: usize,
}

#[derive(Clone)]
pub struct RunHarness {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: Endpoint,
    scenario: Arc<dyn Scenario>,
    args: Vec<ScenarioArg>,
    services: Services,
    live: LiveCounter,
    state: Mutex<HarnessState>,
}

impl RunHarness {
    pub fn new(
        endpoint: Endpoint,
        scenario: Arc<dyn Scenario>,
        args: Vec<ScenarioArg>,
        services: Services,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                scenario,
                args,
                services,
                live: LiveCounter::new(),
                state: Mutex::new(HarnessState::default()),
            }),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn metrics(&self) -> &MetricsHandle {
        &self.inner.services.metrics
    }

    /// Start one new scenario instance
    ///
    /// Must be called from within a tokio runtime. Any connect request made
    /// by the driver's first action is queued before this returns.
    pub fn run(&self) {
        let live = self.inner.live.increment();
        let ctx = ScenarioContext {
            metrics: self.inner.services.metrics.clone(),
        };

        let driver = match self.inner.scenario.create(&self.inner.args, ctx) {
            Ok(driver) => driver,
            Err(e) => {
                error!("Failed to start scenario instance: {}", e);
                self.counter("scenario.create_failed", 1);
                self.remove_processor();
                return;
            }
        };

        let mut instance = Instance::new(driver);
        debug!("Started instance {} ({} live)", instance.id(), live);
        let action = instance.resume(Input::Start);
        self.dispatch(instance, action);
    }

    /// Queue `instance` for a connection and start one attempt
    pub fn connect(&self, mut instance: Instance) {
        if let Some(stale) = instance.detach() {
            warn!(
                "Instance {} asked to connect while holding connection {}; dropping it",
                instance.id(),
                stale.id()
            );
            self.remove_client(&stale.id());
        }

        self.lock().enqueue(instance);
        self.spawn_attempt();
    }

    /// Post a notification on behalf of `instance`
    ///
    /// The instance is resumed exactly once, with the outcome.
    pub fn send_notification(&self, mut instance: Instance, request: NotificationRequest) {
        let harness = self.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = harness.inner.services.notifier.post(request).await;
            harness.timer("notification.send", started.elapsed());

            match &result {
                Ok(response) => {
                    debug!(
                        "Notification for instance {} answered with {}",
                        instance.id(),
                        response.status
                    );
                    harness.counter("notification.sent", 1);
                }
                Err(e) => {
                    debug!("Notification for instance {} failed: {}", instance.id(), e);
                    harness.counter("notification.error", 1);
                }
            }

            let action = instance.resume(Input::Notification(result));
            harness.dispatch(instance, action);
        });
    }

    /// A connection finished opening
    ///
    /// Returns the instance it was assigned to, or `None` after closing it
    /// when nobody is waiting.
    pub async fn add_client(&self, mut connection: Box<dyn Connection>) -> Option<Instance> {
        let id = connection.id();
        let assigned = self.lock().assign(id);

        match assigned {
            Some(mut instance) => {
                debug!("Connection {} assigned to instance {}", id, instance.id());
                self.counter("client.connected", 1);
                instance.attach(connection);
                Some(instance)
            }
            None => {
                info!("No instance waiting for connection {}; closing it", id);
                self.counter("client.surplus", 1);
                connection.close().await;
                None
            }
        }
    }

    /// A connection closed or failed to open
    ///
    /// Returns true if it was serving an instance. An unmatched connection
    /// with instances still waiting triggers a replacement attempt.
    pub fn remove_client(&self, id: &ConnectionId) -> bool {
        let release = self.lock().release(id);

        match release {
            Release::Registered(instance) => {
                debug!("Connection {} released by instance {}", id, instance);
                true
            }
            Release::Unmatched { waiting } if waiting > 0 => {
                debug!(
                    "Connection {} closed unassigned with {} waiting; retrying",
                    id, waiting
                );
                self.spawn_attempt();
                false
            }
            Release::Unmatched { .. } => false,
        }
    }

    /// An instance finished
    pub fn remove_processor(&self) {
        if self.inner.live.decrement() && self.is_drained() {
            debug!("All instances for {} finished", self.inner.endpoint);
        }
    }

    /// Record a timing sample
    pub fn timer(&self, name: &str, duration: Duration) {
        self.inner.services.metrics.timer(name, duration);
    }

    /// Increment a counter
    pub fn counter(&self, name: &str, count: u64) {
        self.inner.services.metrics.counter(name, count);
    }

    /// Drop every instance still waiting for a connection
    ///
    /// Each dropped instance counts as finished. Returns how many were
    /// dropped.
    pub fn cancel_waiters(&self) -> usize {
        let cancelled = self.lock().drain_waiters();
        for instance in &cancelled {
            debug!("Cancelled waiting instance {}", instance.id());
            self.remove_processor();
        }
        cancelled.len()
    }

    pub fn live(&self) -> usize {
        self.inner.live.get()
    }

    pub fn is_drained(&self) -> bool {
        self.inner.live.is_drained()
    }

    pub fn stats(&self) -> HarnessStats {
        let state = self.lock();
        HarnessStats {
            live: self.inner.live.get(),
            waiting: state.waiting(),
            active: state.active(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HarnessState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Carry out `action` for `instance`
    ///
    /// Connect and notification requests hand the instance off right away;
    /// everything else continues in a drive task.
    fn dispatch(&self, instance: Instance, action: Action) {
        match action {
            Action::Connect => self.connect(instance),
            Action::SendNotification(request) => self.send_notification(instance, request),
            Action::Finished if !instance.is_connected() => self.finish(instance),
            action => {
                let harness = self.clone();
                tokio::spawn(async move { harness.drive(instance, action).await });
            }
        }
    }

    async fn drive(self, mut instance: Instance, mut action: Action) {
        loop {
            let input = match action {
                action @ (Action::Connect | Action::SendNotification(_)) => {
                    self.dispatch(instance, action);
                    return;
                }
                Action::Finished => {
                    self.release_connection(&mut instance).await;
                    self.finish(instance);
                    return;
                }
                Action::Send(text) => Input::Sent(self.send(&mut instance, text).await),
                Action::Receive { timeout } => {
                    Input::Received(self.receive(&mut instance, timeout).await)
                }
                Action::Wait(duration) => {
                    tokio::time::sleep(duration).await;
                    Input::Waited
                }
                Action::Disconnect => {
                    self.release_connection(&mut instance).await;
                    Input::Disconnected
                }
            };
            action = instance.resume(input);
        }
    }

    async fn send(&self, instance: &mut Instance, text: String) -> Result<(), TransportError> {
        let Some(connection) = instance.connection_mut() else {
            return Err(TransportError::NotConnected);
        };
        let result = connection.send(text).await;
        if let Err(e) = &result {
            debug!("Send failed for instance {}: {}", instance.id(), e);
            self.release_connection(instance).await;
        }
        result
    }

    async fn receive(
        &self,
        instance: &mut Instance,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, TransportError> {
        let Some(connection) = instance.connection_mut() else {
            return Err(TransportError::NotConnected);
        };
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, connection.recv()).await {
                Ok(received) => received.map(Some),
                Err(_) => Ok(None),
            },
            None => connection.recv().await.map(Some),
        };
        if let Err(e) = &result {
            debug!("Receive failed for instance {}: {}", instance.id(), e);
            self.release_connection(instance).await;
        }
        result
    }

    /// Close and unregister the instance's connection, if any
    async fn release_connection(&self, instance: &mut Instance) {
        if let Some(mut connection) = instance.detach() {
            let id = connection.id();
            connection.close().await;
            self.remove_client(&id);
        }
    }

    fn finish(&self, instance: Instance) {
        debug!("Instance {} finished", instance.id());
        drop(instance);
        self.remove_processor();
    }

    fn spawn_attempt(&self) {
        let harness = self.clone();
        let id = ConnectionId::new();
        tokio::spawn(async move { harness.attempt(id).await });
    }

    async fn attempt(self, id: ConnectionId) {
        let started = Instant::now();
        match self
            .inner
            .services
            .connector
            .open(&self.inner.endpoint, id)
            .await
        {
            Ok(connection) => {
                self.timer("client.connect", started.elapsed());
                if let Some(mut instance) = self.add_client(connection).await {
                    let action = instance.resume(Input::Connected);
                    self.dispatch(instance, action);
                }
            }
            Err(e) => {
                warn!(
                    "Connection attempt {} to {} failed: {}",
                    id, self.inner.endpoint, e
                );
                self.counter("client.connect_failed", 1);
                self.remove_client(&id);
            }
        }
    }
}

impl Completion for RunHarness {
    fn is_finished(&self) -> bool {
        self.is_drained()
    }
}
