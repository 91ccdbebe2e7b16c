//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Only the websocket transport is supported, so every packet is one text
//! frame: a one-digit Engine.IO type, and for messages a one-digit Socket.IO
//! type, optional `/namespace,`, optional ack id, then JSON.
//!
//! ```text
//! 0{"sid":..,"upgrades":[],"pingInterval":25000,...}   server → client  open
//! 40                                                   client → server  connect "/"
//! 40{"sid":"..."}                                      server → client  connect ack
//! 42["handPosition",[{..}]]                            server → client  event
//! 2 / 3                                                ping / pong
//! ```

use std::time::Duration;

use serde_json::{json, Value};

use super::constants::*;
use super::ProtocolError;

/// Engine.IO handshake packet sent right after the WebSocket upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPacket {
    pub sid: String,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub max_payload: usize,
}

impl OpenPacket {
    pub fn encode(&self) -> String {
        let body = json!({
            "sid": self.sid,
            "upgrades": [],
            "pingInterval": self.ping_interval.as_millis() as u64,
            "pingTimeout": self.ping_timeout.as_millis() as u64,
            "maxPayload": self.max_payload,
        });
        format!("{EIO_OPEN}{body}")
    }
}

/// A decoded client → server packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    /// Engine.IO close
    Close,
    /// Engine.IO ping with optional probe payload
    Ping(String),
    /// Engine.IO pong
    Pong(String),
    /// Transport upgrade or noop; nothing to do over websocket
    Noop,
    /// Socket.IO namespace connect
    Connect { namespace: String },
    /// Socket.IO namespace disconnect
    Disconnect { namespace: String },
    /// Socket.IO event from the client, raw JSON arguments
    Event { namespace: String, data: String },
    /// Acks, connect errors, binary packets
    Other { kind: char, namespace: String },
}

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<ClientPacket, ProtocolError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(ProtocolError::Empty)?;
    let body = chars.as_str();

    match kind {
        EIO_CLOSE => Ok(ClientPacket::Close),
        EIO_PING => Ok(ClientPacket::Ping(body.to_string())),
        EIO_PONG => Ok(ClientPacket::Pong(body.to_string())),
        EIO_UPGRADE | EIO_NOOP => Ok(ClientPacket::Noop),
        EIO_MESSAGE => decode_socket(body),
        other => Err(ProtocolError::UnknownEngineType(other)),
    }
}

fn decode_socket(body: &str) -> Result<ClientPacket, ProtocolError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(ProtocolError::Empty)?;
    let (namespace, rest) = split_namespace(chars.as_str());

    match kind {
        SIO_CONNECT => Ok(ClientPacket::Connect { namespace }),
        SIO_DISCONNECT => Ok(ClientPacket::Disconnect { namespace }),
        SIO_EVENT => Ok(ClientPacket::Event {
            namespace,
            data: rest.trim_start_matches(|c: char| c.is_ascii_digit()).to_string(),
        }),
        SIO_ACK | SIO_CONNECT_ERROR | SIO_BINARY_EVENT | SIO_BINARY_ACK => {
            Ok(ClientPacket::Other { kind, namespace })
        }
        other => Err(ProtocolError::UnknownSocketType(other)),
    }
}

/// Split a leading `/namespace,` off a Socket.IO body
fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.find(',') {
        Some(comma) => (rest[..comma].to_string(), &rest[comma + 1..]),
        None => (rest.to_string(), ""),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

/// `42["<name>",<payload>]` on the default namespace
pub fn encode_event(name: &str, payload_json: &str) -> String {
    let name = Value::String(name.to_string());
    format!("{EIO_MESSAGE}{SIO_EVENT}[{name},{payload_json}]")
}

/// `40{"sid":"<sid>"}`
pub fn encode_connect_ack(sid: &str) -> String {
    format!("{EIO_MESSAGE}{SIO_CONNECT}{}", json!({ "sid": sid }))
}

/// `44/<ns>,{"message":"<message>"}`
pub fn encode_connect_error(namespace: &str, message: &str) -> String {
    format!(
        "{EIO_MESSAGE}{SIO_CONNECT_ERROR}{}{}",
        namespace_prefix(namespace),
        json!({ "message": message })
    )
}

/// Server-initiated namespace disconnect
pub fn encode_disconnect() -> String {
    format!("{EIO_MESSAGE}{SIO_DISCONNECT}")
}

pub fn encode_ping() -> String {
    EIO_PING.to_string()
}

pub fn encode_pong(payload: &str) -> String {
    format!("{EIO_PONG}{payload}")
}
