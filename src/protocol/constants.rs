//! Wire protocol constants

use std::time::Duration;

/// Event name carrying detection batches
pub const HAND_POSITION_EVENT: &str = "handPosition";

/// Engine.IO protocol revision spoken by Socket.IO v3+ clients
pub const ENGINE_IO_VERSION: &str = "4";

/// Default mount path of the Socket.IO endpoint
pub const DEFAULT_SOCKETIO_PATH: &str = "/socket.io/";

/// The only namespace served
pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO heartbeat interval advertised in the open packet
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(25_000);

/// Grace period for a pong after a ping
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Largest inbound message accepted, in bytes
pub const DEFAULT_MAX_PAYLOAD: usize = 1_000_000;

// Engine.IO packet types
pub const EIO_OPEN: char = '0';
pub const EIO_CLOSE: char = '1';
pub const EIO_PING: char = '2';
pub const EIO_PONG: char = '3';
pub const EIO_MESSAGE: char = '4';
pub const EIO_UPGRADE: char = '5';
pub const EIO_NOOP: char = '6';

// Socket.IO packet types (inside an Engine.IO message)
pub const SIO_CONNECT: char = '0';
pub const SIO_DISCONNECT: char = '1';
pub const SIO_EVENT: char = '2';
pub const SIO_ACK: char = '3';
pub const SIO_CONNECT_ERROR: char = '4';
pub const SIO_BINARY_EVENT: char = '5';
pub const SIO_BINARY_ACK: char = '6';
