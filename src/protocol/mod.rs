//! Subscriber wire protocols
//!
//! Subscribers connect over WebSocket and speak one of two dialects, chosen by
//! the request path at handshake time:
//!
//! - `SocketIo`: Socket.IO v5 over Engine.IO v4 (websocket transport only),
//!   so stock `socket.io-client` apps can listen for `handPosition`
//! - `PlainJson`: every event is one text frame `{"event": .., "data": ..}`

pub mod constants;
pub mod engineio;
pub mod handshake;

use thiserror::Error;

pub use constants::*;
pub use engineio::{ClientPacket, OpenPacket};
pub use handshake::{negotiate, origin_allowed, HandshakeRejection};

use crate::registry::BroadcastEvent;

/// Dialect negotiated for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireProtocol {
    SocketIo,
    PlainJson,
}

impl WireProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireProtocol::SocketIo => "socket.io",
            WireProtocol::PlainJson => "json",
        }
    }

    /// Frame a broadcast event as one text message for this dialect
    pub fn frame_event(&self, event: &BroadcastEvent) -> String {
        match self {
            WireProtocol::SocketIo => engineio::encode_event(event.name(), event.payload()),
            WireProtocol::PlainJson => {
                let name = serde_json::Value::String(event.name().to_string());
                format!(r#"{{"event":{},"data":{}}}"#, name, event.payload())
            }
        }
    }
}

impl std::fmt::Display for WireProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed inbound packet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,

    #[error("unknown Engine.IO packet type '{0}'")]
    UnknownEngineType(char),

    #[error("unknown Socket.IO packet type '{0}'")]
    UnknownSocketType(char),
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn test_frame_plain_json() {
        let event = BroadcastEvent::new(HAND_POSITION_EVENT, &json!([{"x": 1.0}])).unwrap();
        let text = WireProtocol::PlainJson.frame_event(&event);

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"event": "handPosition", "data": [{"x": 1.0}]}));
    }

    #[test]
    fn test_frame_socketio() {
        let event = BroadcastEvent::new(HAND_POSITION_EVENT, &json!([])).unwrap();
        assert_eq!(
            WireProtocol::SocketIo.frame_event(&event),
            r#"42["handPosition",[]]"#
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(WireProtocol::SocketIo.to_string(), "socket.io");
        assert_eq!(WireProtocol::PlainJson.to_string(), "json");
    }
}
