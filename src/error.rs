//! Crate-level error types
//!
//! Errors local to one frame or one subscriber never reach this type; they
//! are logged where they happen. What ends up here is startup and
//! connection-level failure.

use std::io;

use thiserror::Error;

use crate::producer::EngineError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The inference engine failed to start or crashed
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Handshake did not complete in time
    #[error("Handshake timed out")]
    HandshakeTimeout,
}
