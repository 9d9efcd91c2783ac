use serde::{Deserialize, Serialize};

/// Client to Server messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "messageType", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Handshake; an empty `uaid` asks the service to assign one
    Hello {
        uaid: String,
        use_webpush: bool,
        #[serde(rename = "channelIDs", default, skip_serializing_if = "Vec::is_empty")]
        channel_ids: Vec<String>,
    },
    /// Subscribe a new channel
    Register {
        #[serde(rename = "channelID")]
        channel_id: String,
    },
    /// Drop a channel subscription
    Unregister {
        #[serde(rename = "channelID")]
        channel_id: String,
    },
    /// Acknowledge delivered notifications
    Ack { updates: Vec<Update> },
    /// Keepalive
    Ping,
}

/// Server to Client messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "messageType", rename_all = "lowercase")]
pub enum ServerMessage {
    Hello {
        uaid: String,
        status: u16,
    },
    Register {
        #[serde(rename = "channelID")]
        channel_id: String,
        status: u16,
        #[serde(rename = "pushEndpoint", default)]
        push_endpoint: String,
    },
    Unregister {
        #[serde(rename = "channelID")]
        channel_id: String,
        status: u16,
    },
    /// A push message delivered to this client
    Notification {
        #[serde(rename = "channelID")]
        channel_id: String,
        version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    Ping,
    /// Anything the scenarios do not interpret
    #[serde(other)]
    Unknown,
}

/// One acknowledged notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Update {
    #[serde(rename = "channelID")]
    pub channel_id: String,
    pub version: String,
}

impl ClientMessage {
    /// Serialize to the JSON text frame sent over the socket
    pub fn to_frame(&self) -> String {
        // Plain-data enum with string keys; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl ServerMessage {
    /// Parse a JSON text frame
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    /// Get the message type name for metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::Hello { .. } => "hello",
            ServerMessage::Register { .. } => "register",
            ServerMessage::Unregister { .. } => "unregister",
            ServerMessage::Notification { .. } => "notification",
            ServerMessage::Ping => "ping",
            ServerMessage::Unknown => "unknown",
        }
    }
}
