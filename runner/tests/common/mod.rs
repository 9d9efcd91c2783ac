//! Common Test Utilities for Integration Tests
//!
//! A stub push service (WebSocket + HTTP push endpoint) and shared helpers
//! used across integration test modules.

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use pushload_runner::harness::Services;
use pushload_runner::metrics::{MetricsHandle, MetricsSink};
use pushload_runner::notify::HttpNotifier;
use pushload_runner::transport::WsConnector;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const TEST_ORIGIN: &str = "loadtest.example:9000";

/// Install a test-writer subscriber honouring RUST_LOG
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

// ============================================================================
// Metrics
// ============================================================================

/// Sink counting samples per name
#[derive(Default)]
pub struct CountingSink {
    counters: Mutex<HashMap<String, u64>>,
    timings: Mutex<HashMap<String, usize>>,
}

impl CountingSink {
    pub fn count(&self, name: &str) -> u64 {
        self.counters.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn samples(&self, name: &str) -> usize {
        self.timings.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl MetricsSink for CountingSink {
    fn timing(&self, name: &str, _millis: u64) {
        *self
            .timings
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default() += 1;
    }

    fn increment(&self, name: &str, count: u64) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default() += count;
    }
}

/// Real WebSocket connector and HTTP notifier, counting metrics
pub fn live_services() -> (Services, Arc<CountingSink>) {
    let sink = Arc::new(CountingSink::default());
    let services = Services::new(
        Arc::new(WsConnector::new(TEST_ORIGIN)),
        Arc::new(HttpNotifier::new().unwrap()),
        MetricsHandle::new(sink.clone()),
    );
    (services, sink)
}

// ============================================================================
// Stub push service
// ============================================================================

/// A push request as seen by the stub service
#[derive(Debug, Clone)]
pub struct ReceivedPush {
    pub channel: String,
    pub ttl: Option<String>,
    pub content_encoding: Option<String>,
    pub body: Bytes,
}

#[derive(Default)]
struct PushState {
    base_url: String,
    /// Channel id -> outbound frame queue of the connection that registered it
    channels: Mutex<HashMap<String, mpsc::UnboundedSender<String>>>,
    pushes: Mutex<Vec<ReceivedPush>>,
    origins: Mutex<Vec<Option<String>>>,
}

/// Minimal push service speaking the hello/register/notification protocol
#[derive(Clone)]
pub struct StubPushServer {
    pub addr: SocketAddr,
    state: Arc<PushState>,
}

impl StubPushServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(PushState {
            base_url: format!("http://{}", addr),
            ..Default::default()
        });

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/push/:channel", post(push_handler))
            .route("/redirect", post(redirect_handler))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn pushes(&self) -> Vec<ReceivedPush> {
        self.state.pushes.lock().unwrap().clone()
    }

    pub fn origins(&self) -> Vec<Option<String>> {
        self.state.origins.lock().unwrap().clone()
    }

    /// Channels currently registered
    pub fn registered(&self) -> usize {
        self.state.channels.lock().unwrap().len()
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<PushState>>,
) -> impl IntoResponse {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.origins.lock().unwrap().push(origin);
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<PushState>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut owned = Vec::new();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(msg) = serde_json::from_str::<Value>(&text) else {
                    break;
                };
                let channel = msg["channelID"].as_str().unwrap_or_default().to_string();

                let reply = match msg["messageType"].as_str() {
                    Some("hello") => Some(json!({
                        "messageType": "hello",
                        "uaid": uuid::Uuid::new_v4().simple().to_string(),
                        "status": 200,
                    })),
                    Some("register") => {
                        state.channels.lock().unwrap().insert(channel.clone(), tx.clone());
                        owned.push(channel.clone());
                        Some(json!({
                            "messageType": "register",
                            "channelID": channel,
                            "status": 200,
                            "pushEndpoint": format!("{}/push/{}", state.base_url, channel),
                        }))
                    }
                    Some("unregister") => {
                        state.channels.lock().unwrap().remove(&channel);
                        Some(json!({
                            "messageType": "unregister",
                            "channelID": channel,
                            "status": 200,
                        }))
                    }
                    Some("ping") => Some(json!({ "messageType": "ping" })),
                    _ => None,
                };

                if let Some(reply) = reply
                    && socket.send(Message::Text(reply.to_string())).await.is_err()
                {
                    break;
                }
            }
            Some(frame) = rx.recv() => {
                if socket.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
        }
    }

    let mut channels = state.channels.lock().unwrap();
    for channel in owned {
        channels.remove(&channel);
    }
}

async fn push_handler(
    Path(channel): Path<String>,
    State(state): State<Arc<PushState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    state.pushes.lock().unwrap().push(ReceivedPush {
        channel: channel.clone(),
        ttl: header_value("ttl"),
        content_encoding: header_value("content-encoding"),
        body: body.clone(),
    });

    let sender = state.channels.lock().unwrap().get(&channel).cloned();
    let Some(sender) = sender else {
        return StatusCode::NOT_FOUND;
    };

    let data = if body.is_empty() {
        Value::Null
    } else {
        Value::String(String::from_utf8_lossy(&body).into_owned())
    };
    let frame = json!({
        "messageType": "notification",
        "channelID": channel,
        "version": uuid::Uuid::new_v4().to_string(),
        "data": data,
    });
    let _ = sender.send(frame.to_string());
    StatusCode::CREATED
}

async fn redirect_handler() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/push/elsewhere")])
}
