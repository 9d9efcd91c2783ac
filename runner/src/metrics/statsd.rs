//! StatsD UDP sink

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::MetricsSink;
use crate::config::StatsdConfig;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to resolve StatsD host {0}")]
    Resolve(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends samples to a StatsD collector as plain-text datagrams
///
/// Sends use `try_send_to`, so a full socket buffer drops the sample instead
/// of blocking the event loop.
pub struct StatsdSink {
    namespace: String,
    target: SocketAddr,
    socket: Mutex<Option<UdpSocket>>,
}

impl StatsdSink {
    /// Resolve the collector address and bind an ephemeral local socket
    pub async fn connect(config: &StatsdConfig) -> Result<Self, MetricsError> {
        let target = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .ok_or_else(|| MetricsError::Resolve(config.host.clone()))?;

        let unspecified = if target.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        };
        let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0)).await?;

        info!(
            "StatsD sink sending to {} with namespace '{}'",
            target, config.namespace
        );

        Ok(Self {
            namespace: config.namespace.clone(),
            target,
            socket: Mutex::new(Some(socket)),
        })
    }

    fn send(&self, line: String) {
        let socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(socket) = socket.as_ref()
            && let Err(e) = socket.try_send_to(line.as_bytes(), self.target)
        {
            debug!("Dropped StatsD sample: {}", e);
        }
    }
}

impl MetricsSink for StatsdSink {
    fn timing(&self, name: &str, millis: u64) {
        self.send(format_line(&self.namespace, name, millis, "ms"));
    }

    fn increment(&self, name: &str, count: u64) {
        self.send(format_line(&self.namespace, name, count, "c"));
    }

    fn close(&self) {
        let mut socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        if socket.take().is_some() {
            debug!("StatsD socket closed");
        }
    }
}

/// `<namespace>.<name>:<value>|<kind>`, namespace omitted when empty
fn format_line(namespace: &str, name: &str, value: u64, kind: &str) -> String {
    if namespace.is_empty() {
        format!("{}:{}|{}", name, value, kind)
    } else {
        format!("{}.{}:{}|{}", namespace, name, value, kind)
    }
}
