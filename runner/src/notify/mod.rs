//! Outbound push notifications
//!
//! A scenario driver describes a notification with a `NotificationRequest`;
//! the harness hands it to a `Notifier` and delivers the `NotificationResult`
//! back to that same driver.

mod http;

pub use http::HttpNotifier;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Content type sent with every payload
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Content encoding token sent with every payload
pub const CONTENT_ENCODING: &str = "aesgcm-128";

/// Demo encryption parameters; the service under test does not decrypt them
pub const ENCRYPTION: &str = r#"keyid="http://example.org/bob/keys/123;salt="XZwpw6o37R-6qoZjw6KwAw""#;

/// Deliberately invalid key paired with `ENCRYPTION`
pub const ENCRYPTION_KEY: &str = "Invalid-Key-Used-Here";

/// Errors surfaced to the requesting driver
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Invalid notification URL: {0}")]
    InvalidUrl(String),

    #[error("Notification request failed: {0}")]
    Request(String),

    #[error("Failed to read notification response body: {0}")]
    Body(String),
}

/// A single notification to POST to a push endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub url: String,
    pub payload: Option<Bytes>,
    /// Seconds the service should retain the message
    pub ttl: u32,
}

impl NotificationRequest {
    pub fn new(url: impl Into<String>, payload: Option<Bytes>, ttl: u32) -> Self {
        Self {
            url: url.into(),
            payload,
            ttl,
        }
    }

    /// Headers sent with this request
    ///
    /// The encoding and encryption headers are only attached when a payload
    /// is present.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("TTL", self.ttl.to_string())];
        if self.payload.is_some() {
            headers.push(("Content-Type", CONTENT_TYPE.to_string()));
            headers.push(("Content-Encoding", CONTENT_ENCODING.to_string()));
            headers.push(("Encryption", ENCRYPTION.to_string()));
            headers.push(("Encryption-Key", ENCRYPTION_KEY.to_string()));
        }
        headers
    }
}

/// Response metadata and fully-read body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResponse {
    pub status: u16,
    pub body: Bytes,
}

impl NotificationResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outcome delivered to the driver; non-2xx statuses are `Ok`
pub type NotificationResult = Result<NotificationResponse, NotifyError>;

/// Performs one outbound notification request
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, request: NotificationRequest) -> NotificationResult;
}
