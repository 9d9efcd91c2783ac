//! WebSocket connections via tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::{Connection, ConnectionId, Connector, Endpoint, TransportError};

/// Opens WebSocket connections, using TLS for `wss://` endpoints
pub struct WsConnector {
    origin: String,
}

impl WsConnector {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(
        &self,
        endpoint: &Endpoint,
        id: ConnectionId,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let origin = HeaderValue::from_str(&self.origin)
            .map_err(|e| TransportError::Connect(format!("invalid origin: {}", e)))?;
        request.headers_mut().insert("Origin", origin);

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(
            "Opened connection {} to {} (tls={})",
            id,
            endpoint,
            endpoint.is_tls()
        );
        Ok(Box::new(WsConnection { id, ws }))
    }
}

/// One WebSocket client connection
pub struct WsConnection {
    id: ConnectionId,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        while let Some(result) = self.ws.next().await {
            match result.map_err(|e| TransportError::Receive(e.to_string()))? {
                Message::Text(text) => return Ok(text.as_str().to_owned()),
                Message::Close(_) => return Err(TransportError::Closed),
                // Pings are answered by tungstenite; binary frames are not part of the protocol
                _ => {}
            }
        }
        Err(TransportError::Closed)
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("Error closing connection {}: {}", self.id, e);
        }
    }
}
