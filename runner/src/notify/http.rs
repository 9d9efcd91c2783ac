//! reqwest-backed notification transport

use async_trait::async_trait;
use reqwest::{Client, Url, redirect::Policy};
use tracing::debug;

use super::{NotificationRequest, NotificationResponse, NotificationResult, Notifier, NotifyError};

/// POSTs notifications over HTTP(S)
///
/// Redirects are never followed and no request timeout is applied; a stalled
/// endpoint keeps its driver suspended.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new() -> Result<Self, NotifyError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn post(&self, request: NotificationRequest) -> NotificationResult {
        let url = Url::parse(&request.url).map_err(|e| NotifyError::InvalidUrl(e.to_string()))?;

        let mut builder = self.client.post(url);
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(payload) = request.payload {
            builder = builder.body(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| NotifyError::Body(e.to_string()))?;

        debug!("Notification to {} answered {}", request.url, status);
        Ok(NotificationResponse { status, body })
    }
}
