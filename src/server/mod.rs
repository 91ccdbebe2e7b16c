//! Relay server
//!
//! - `RelayConfig`: builder-style configuration
//! - `Listener`: TCP accept loop with connection limit
//! - `Connection`: one WebSocket subscriber
//! - `RelayServer`: startup, serving and bounded shutdown

pub mod config;
pub mod connection;
pub mod listener;
pub mod runtime;

pub use config::{RelayConfig, DEFAULT_PORT};
pub use connection::Connection;
pub use listener::Listener;
pub use runtime::RelayServer;
