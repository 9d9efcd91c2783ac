//! Push-service WebSocket messages used by the built-in scenarios

mod messages;

pub use messages::{ClientMessage, ServerMessage, Update};
