//! Runner configuration
//!
//! Configuration is loaded from environment variables, then individual fields
//! may be overridden by command-line flags.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Main runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// StatsD collector settings
    pub statsd: StatsdConfig,
    /// `Origin` header sent on every WebSocket handshake
    pub origin: String,
    /// How often the host checks whether the run has finished
    pub poll_interval: Duration,
    /// Serve Prometheus metrics on this address instead of sending to StatsD
    pub metrics_listen: Option<SocketAddr>,
}

/// StatsD collector configuration
#[derive(Debug, Clone)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16,
    /// Prefix prepended to every metric name
    pub namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            statsd: StatsdConfig::default(),
            origin: "localhost:9000".to_string(),
            poll_interval: Duration::from_secs(1),
            metrics_listen: None,
        }
    }
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8125,
            namespace: "aplt".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // StatsD config
        if let Ok(host) = env::var("STATSD_HOST")
            && !host.is_empty()
        {
            config.statsd.host = host;
        }
        if let Ok(port) = env::var("STATSD_PORT")
            && let Ok(p) = port.parse()
        {
            config.statsd.port = p;
        }
        if let Ok(namespace) = env::var("STATSD_NAMESPACE") {
            config.statsd.namespace = namespace;
        }

        // Connection config
        if let Ok(origin) = env::var("PUSHLOAD_ORIGIN")
            && !origin.is_empty()
        {
            config.origin = origin;
        }

        // Host loop config
        if let Ok(val) = env::var("PUSHLOAD_POLL_INTERVAL_SECS")
            && let Ok(secs) = val.parse::<u64>()
            && secs > 0
        {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("PUSHLOAD_METRICS_LISTEN")
            && let Ok(addr) = val.parse()
        {
            config.metrics_listen = Some(addr);
        }

        config
    }

    /// Apply StatsD overrides given on the command line
    pub fn with_statsd_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        namespace: Option<String>,
    ) -> Self {
        if let Some(host) = host {
            self.statsd.host = host;
        }
        if let Some(port) = port {
            self.statsd.port = port;
        }
        if let Some(namespace) = namespace {
            self.statsd.namespace = namespace;
        }
        self
    }
}
