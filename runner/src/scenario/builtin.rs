//! Built-in scenarios
//!
//! Each driver is an explicit state machine: `resume` takes the current phase
//! out, matches it against the incoming result, and stores the next phase.
//! Anything unexpected counts a `scenario.error` and disconnects; drivers never
//! panic.

use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::{Action, Driver, Input, Scenario, ScenarioArg, ScenarioContext, ScenarioError};
use crate::metrics::MetricsHandle;
use crate::notify::NotificationRequest;
use crate::protocol::{ClientMessage, ServerMessage, Update};

pub const BASIC: &str = "pushload.scenarios:basic";
pub const CONNECT_AND_IDLE: &str = "pushload.scenarios:connect_and_idle";
pub const NOTIFY_REPEAT: &str = "pushload.scenarios:notify_repeat";

/// How long a driver waits for a reply frame
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

const NOTIFICATION_TTL: u32 = 60;

const BASIC_PAYLOAD: &[u8] = b"aesgcm-128 encrypted load test payload";

fn hello() -> Action {
    Action::Send(
        ClientMessage::Hello {
            uaid: String::new(),
            use_webpush: true,
            channel_ids: Vec::new(),
        }
        .to_frame(),
    )
}

fn await_reply() -> Action {
    Action::Receive {
        timeout: Some(REPLY_TIMEOUT),
    }
}

/// Interpret a received frame
fn parse(frame: &str) -> Result<ServerMessage, String> {
    ServerMessage::from_frame(frame).map_err(|e| format!("unparseable frame: {}", e))
}

fn unexpected(message: Result<ServerMessage, String>) -> String {
    match message {
        Ok(msg) => format!("unexpected {} message", msg.message_type()),
        Err(reason) => reason,
    }
}

fn describe(input: Input) -> String {
    match input {
        Input::Sent(Err(e)) => e.to_string(),
        Input::Received(Err(e)) => e.to_string(),
        Input::Received(Ok(None)) => "timed out waiting for a reply".to_string(),
        Input::Notification(Err(e)) => e.to_string(),
        other => format!("unexpected input {:?}", other),
    }
}

/// Registers one channel and pushes notifications through it
pub struct PushScenario {
    kind: PushKind,
}

#[derive(Debug, Clone, Copy)]
enum PushKind {
    /// One notification with a payload, then unregister
    Basic,
    /// `count` payload-less notifications spaced by `interval_secs`
    Repeat,
}

impl PushScenario {
    pub fn basic() -> Self {
        Self {
            kind: PushKind::Basic,
        }
    }

    pub fn repeat() -> Self {
        Self {
            kind: PushKind::Repeat,
        }
    }
}

impl Scenario for PushScenario {
    fn create(
        &self,
        args: &[ScenarioArg],
        ctx: ScenarioContext,
    ) -> Result<Box<dyn Driver>, ScenarioError> {
        let plan = match self.kind {
            PushKind::Basic => PushPlan {
                notifications: 1,
                interval: Duration::ZERO,
                payload: Some(Bytes::from_static(BASIC_PAYLOAD)),
                unregister: true,
            },
            PushKind::Repeat => PushPlan {
                notifications: ScenarioArg::uint_or(args, 0, 3)?,
                interval: Duration::from_secs(ScenarioArg::uint_or(args, 1, 1)?),
                payload: None,
                unregister: false,
            },
        };
        Ok(Box::new(PushDriver {
            remaining: plan.notifications,
            plan,
            metrics: ctx.metrics,
            phase: PushPhase::Init,
        }))
    }
}

struct PushPlan {
    notifications: u64,
    interval: Duration,
    payload: Option<Bytes>,
    unregister: bool,
}

enum PushPhase {
    Init,
    Connecting,
    HelloSent { started: Instant },
    AwaitHello { started: Instant },
    RegisterSent { started: Instant, channel: String },
    AwaitRegister { started: Instant, channel: String },
    Notifying { started: Instant, channel: String, endpoint: String },
    AwaitNotification { started: Instant, channel: String, endpoint: String },
    AckSent { channel: String, endpoint: String },
    Pausing { channel: String, endpoint: String },
    UnregisterSent,
    AwaitUnregister,
    Closing,
    Done,
}

struct PushDriver {
    plan: PushPlan,
    metrics: MetricsHandle,
    remaining: u64,
    phase: PushPhase,
}

impl Driver for PushDriver {
    fn resume(&mut self, input: Input) -> Action {
        let phase = std::mem::replace(&mut self.phase, PushPhase::Done);
        let (next, action) = self.step(phase, input);
        self.phase = next;
        action
    }
}

impl PushDriver {
    fn step(&mut self, phase: PushPhase, input: Input) -> (PushPhase, Action) {
        match (phase, input) {
            (PushPhase::Init, Input::Start) => (PushPhase::Connecting, Action::Connect),
            (PushPhase::Connecting, Input::Connected) => (
                PushPhase::HelloSent {
                    started: Instant::now(),
                },
                hello(),
            ),
            (PushPhase::HelloSent { started }, Input::Sent(Ok(()))) => {
                (PushPhase::AwaitHello { started }, await_reply())
            }
            (PushPhase::AwaitHello { started }, Input::Received(Ok(Some(frame)))) => {
                match parse(&frame) {
                    Ok(ServerMessage::Hello { status: 200, .. }) => {
                        self.metrics.timer("hello", started.elapsed());
                        let channel = Uuid::new_v4().to_string();
                        let register = ClientMessage::Register {
                            channel_id: channel.clone(),
                        };
                        (
                            PushPhase::RegisterSent {
                                started: Instant::now(),
                                channel,
                            },
                            Action::Send(register.to_frame()),
                        )
                    }
                    Ok(ServerMessage::Ping | ServerMessage::Unknown) => {
                        (PushPhase::AwaitHello { started }, await_reply())
                    }
                    other => self.fail("hello", unexpected(other)),
                }
            }
            (PushPhase::RegisterSent { started, channel }, Input::Sent(Ok(()))) => {
                (PushPhase::AwaitRegister { started, channel }, await_reply())
            }
            (PushPhase::AwaitRegister { started, channel }, Input::Received(Ok(Some(frame)))) => {
                match parse(&frame) {
                    Ok(ServerMessage::Register {
                        channel_id,
                        status: 200,
                        push_endpoint,
                    }) if channel_id == channel => {
                        self.metrics.timer("register", started.elapsed());
                        if self.remaining == 0 {
                            self.after_notifications(channel)
                        } else {
                            self.notify(channel, push_endpoint)
                        }
                    }
                    Ok(ServerMessage::Ping | ServerMessage::Unknown) => {
                        (PushPhase::AwaitRegister { started, channel }, await_reply())
                    }
                    other => self.fail("register", unexpected(other)),
                }
            }
            (
                PushPhase::Notifying {
                    started,
                    channel,
                    endpoint,
                },
                Input::Notification(Ok(response)),
            ) if response.is_success() => (
                PushPhase::AwaitNotification {
                    started,
                    channel,
                    endpoint,
                },
                await_reply(),
            ),
            (PushPhase::Notifying { .. }, Input::Notification(Ok(response))) => {
                self.metrics.counter("notification.failed", 1);
                self.fail(
                    "notify",
                    format!("push endpoint answered {}", response.status),
                )
            }
            (PushPhase::Notifying { .. }, input @ Input::Notification(Err(_))) => {
                self.metrics.counter("notification.failed", 1);
                self.fail("notify", describe(input))
            }
            (
                PushPhase::AwaitNotification {
                    started,
                    channel,
                    endpoint,
                },
                Input::Received(Ok(Some(frame))),
            ) => match parse(&frame) {
                Ok(ServerMessage::Notification {
                    channel_id,
                    version,
                    ..
                }) if channel_id == channel => {
                    self.metrics
                        .timer("notification.roundtrip", started.elapsed());
                    self.metrics.counter("notification.received", 1);
                    let ack = ClientMessage::Ack {
                        updates: vec![Update {
                            channel_id,
                            version,
                        }],
                    };
                    (
                        PushPhase::AckSent { channel, endpoint },
                        Action::Send(ack.to_frame()),
                    )
                }
                Ok(
                    ServerMessage::Ping
                    | ServerMessage::Unknown
                    | ServerMessage::Notification { .. },
                ) => (
                    PushPhase::AwaitNotification {
                        started,
                        channel,
                        endpoint,
                    },
                    await_reply(),
                ),
                other => self.fail("notification", unexpected(other)),
            },
            (PushPhase::AckSent { channel, endpoint }, Input::Sent(Ok(()))) => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.after_notifications(channel)
                } else {
                    (
                        PushPhase::Pausing { channel, endpoint },
                        Action::Wait(self.plan.interval),
                    )
                }
            }
            (PushPhase::Pausing { channel, endpoint }, Input::Waited) => {
                self.notify(channel, endpoint)
            }
            (PushPhase::UnregisterSent, Input::Sent(Ok(()))) => {
                (PushPhase::AwaitUnregister, await_reply())
            }
            (PushPhase::AwaitUnregister, Input::Received(Ok(Some(frame)))) => {
                match parse(&frame) {
                    Ok(ServerMessage::Unregister { .. }) => (PushPhase::Closing, Action::Disconnect),
                    Ok(ServerMessage::Ping | ServerMessage::Unknown) => {
                        (PushPhase::AwaitUnregister, await_reply())
                    }
                    other => self.fail("unregister", unexpected(other)),
                }
            }
            (PushPhase::Closing, Input::Disconnected) => (PushPhase::Done, Action::Finished),
            (PushPhase::Done, _) => (PushPhase::Done, Action::Finished),
            (_, input) => self.fail("step", describe(input)),
        }
    }

    fn notify(&self, channel: String, endpoint: String) -> (PushPhase, Action) {
        let request =
            NotificationRequest::new(endpoint.clone(), self.plan.payload.clone(), NOTIFICATION_TTL);
        (
            PushPhase::Notifying {
                started: Instant::now(),
                channel,
                endpoint,
            },
            Action::SendNotification(request),
        )
    }

    fn after_notifications(&self, channel: String) -> (PushPhase, Action) {
        if self.plan.unregister {
            let unregister = ClientMessage::Unregister {
                channel_id: channel,
            };
            (PushPhase::UnregisterSent, Action::Send(unregister.to_frame()))
        } else {
            (PushPhase::Closing, Action::Disconnect)
        }
    }

    fn fail(&self, step: &str, reason: String) -> (PushPhase, Action) {
        debug!("Push scenario failed at {}: {}", step, reason);
        self.metrics.counter("scenario.error", 1);
        (PushPhase::Closing, Action::Disconnect)
    }
}

/// Connects, says hello, idles, then disconnects
///
/// Argument 0: idle seconds (default 5).
pub struct ConnectAndIdle;

impl Scenario for ConnectAndIdle {
    fn create(
        &self,
        args: &[ScenarioArg],
        ctx: ScenarioContext,
    ) -> Result<Box<dyn Driver>, ScenarioError> {
        let idle = Duration::from_secs(ScenarioArg::uint_or(args, 0, 5)?);
        Ok(Box::new(IdleDriver {
            idle,
            metrics: ctx.metrics,
            phase: IdlePhase::Init,
        }))
    }
}

enum IdlePhase {
    Init,
    Connecting,
    HelloSent { started: Instant },
    AwaitHello { started: Instant },
    Idling,
    Closing,
    Done,
}

struct IdleDriver {
    idle: Duration,
    metrics: MetricsHandle,
    phase: IdlePhase,
}

impl Driver for IdleDriver {
    fn resume(&mut self, input: Input) -> Action {
        let phase = std::mem::replace(&mut self.phase, IdlePhase::Done);
        let (next, action) = match (phase, input) {
            (IdlePhase::Init, Input::Start) => (IdlePhase::Connecting, Action::Connect),
            (IdlePhase::Connecting, Input::Connected) => (
                IdlePhase::HelloSent {
                    started: Instant::now(),
                },
                hello(),
            ),
            (IdlePhase::HelloSent { started }, Input::Sent(Ok(()))) => {
                (IdlePhase::AwaitHello { started }, await_reply())
            }
            (IdlePhase::AwaitHello { started }, Input::Received(Ok(Some(frame)))) => {
                match parse(&frame) {
                    Ok(ServerMessage::Hello { status: 200, .. }) => {
                        self.metrics.timer("hello", started.elapsed());
                        (IdlePhase::Idling, Action::Wait(self.idle))
                    }
                    Ok(ServerMessage::Ping | ServerMessage::Unknown) => {
                        (IdlePhase::AwaitHello { started }, await_reply())
                    }
                    other => {
                        debug!("Idle scenario failed at hello: {}", unexpected(other));
                        self.metrics.counter("scenario.error", 1);
                        (IdlePhase::Closing, Action::Disconnect)
                    }
                }
            }
            (IdlePhase::Idling, Input::Waited) => (IdlePhase::Closing, Action::Disconnect),
            (IdlePhase::Closing, Input::Disconnected) => (IdlePhase::Done, Action::Finished),
            (IdlePhase::Done, _) => (IdlePhase::Done, Action::Finished),
            (_, input) => {
                debug!("Idle scenario failed: {}", describe(input));
                self.metrics.counter("scenario.error", 1);
                (IdlePhase::Closing, Action::Disconnect)
            }
        };
        self.phase = next;
        action
    }
}
