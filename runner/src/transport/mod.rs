//! Transport connections to the push service
//!
//! This module provides:
//! - `Connector` trait, the connection factory the harness asks for new sockets
//! - `Connection` trait, one open socket owned by exactly one driver instance
//! - `WsConnector` for real WebSocket (ws:// and wss://) connections

mod ws;

pub use ws::{WsConnection, WsConnector};

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Transport-level failures, delivered to drivers as values
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connection attempt failed: {0}")]
    Connect(String),

    #[error("Connection closed")]
    Closed,

    #[error("Failed to send frame: {0}")]
    Send(String),

    #[error("Failed to receive frame: {0}")]
    Receive(String),

    #[error("Instance has no connection")]
    NotConnected,
}

/// Identity of one connection attempt and, once opened, of its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// WebSocket URL of the service under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parse a `ws://` or `wss://` URL
    pub fn parse(input: &str) -> Result<Self, TransportError> {
        let url = Url::parse(input)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", input, e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self { url }),
            other => Err(TransportError::InvalidEndpoint(format!(
                "{}: unsupported scheme '{}'",
                input, other
            ))),
        }
    }

    /// Whether connections to this endpoint use TLS
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "wss"
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One open connection
#[async_trait]
pub trait Connection: Send {
    fn id(&self) -> ConnectionId;

    /// Send a text frame
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next text frame; `Err(Closed)` once the peer has closed
    async fn recv(&mut self) -> Result<String, TransportError>;

    /// Close the connection; errors are ignored
    async fn close(&mut self);
}

/// Connection factory
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `endpoint`, tagging it with `id`
    async fn open(
        &self,
        endpoint: &Endpoint,
        id: ConnectionId,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_accepts_websocket_schemes() {
        let plain = Endpoint::parse("ws://localhost:8080/").unwrap();
        assert!(!plain.is_tls());

        let secure: Endpoint = "wss://push.example.com".parse().unwrap();
        assert!(secure.is_tls());
    }

    #[test]
    fn test_endpoint_rejects_other_schemes() {
        assert!(matches!(
            Endpoint::parse("https://push.example.com"),
            Err(TransportError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
