//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::broadcast::{BroadcastConfig, DrainMode, DEFAULT_POLL_INTERVAL};
use crate::detection::{ResultExtractor, DEFAULT_MODEL_KEY};
use crate::error::{Error, Result};
use crate::handoff::{HandoffConfig, OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
use crate::protocol::constants::*;
use crate::registry::RegistryConfig;

/// Default listening port
pub const DEFAULT_PORT: u16 = 6789;

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Allowed `Origin` values; `*` allows any
    pub cors_allowed_origins: Vec<String>,

    /// Mount path of the Socket.IO endpoint
    pub socketio_path: String,

    /// Engine.IO heartbeat interval
    pub ping_interval: Duration,

    /// Engine.IO pong grace period
    pub ping_timeout: Duration,

    /// Largest inbound message accepted
    pub max_payload: usize,

    /// WebSocket upgrade must complete within this time
    pub handshake_timeout: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Broadcast tick period
    pub poll_interval: Duration,

    /// Batches published per tick
    pub drain_mode: DrainMode,

    /// Handoff channel capacity, ignored for `Unbounded`
    pub queue_capacity: usize,

    /// What to do when the handoff channel is full
    pub overflow_policy: OverflowPolicy,

    /// How long a subscriber's queue may stay full before it is evicted
    pub publish_timeout: Duration,

    /// Per-subscriber outbound queue length
    pub outbound_capacity: usize,

    /// How long shutdown waits for each component
    pub shutdown_timeout: Duration,

    /// Stats summary interval (zero disables)
    pub stats_interval: Duration,

    /// Workflow output holding the predictions
    pub model_key: String,

    /// Detections below this confidence are dropped
    pub min_confidence: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let handoff = HandoffConfig::default();
        let registry = RegistryConfig::default();

        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            cors_allowed_origins: vec!["*".to_string()],
            socketio_path: DEFAULT_SOCKETIO_PATH.to_string(),
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            max_payload: DEFAULT_MAX_PAYLOAD,
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true, // Small frames, latency matters
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_mode: DrainMode::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: handoff.policy,
            publish_timeout: registry.publish_timeout,
            outbound_capacity: registry.outbound_capacity,
            shutdown_timeout: Duration::from_secs(5),
            stats_interval: Duration::from_secs(30),
            model_key: DEFAULT_MODEL_KEY.to_string(),
            min_confidence: 0.0,
        }
    }
}

impl RelayConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Replace the allowed origins
    pub fn cors_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Set the Engine.IO heartbeat
    pub fn heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.ping_interval = interval;
        self.ping_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the broadcast tick period
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn drain_mode(mut self, mode: DrainMode) -> Self {
        self.drain_mode = mode;
        self
    }

    /// Set the handoff capacity and overflow policy
    pub fn queue(mut self, capacity: usize, policy: OverflowPolicy) -> Self {
        self.queue_capacity = capacity;
        self.overflow_policy = policy;
        self
    }

    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn model_key(mut self, key: impl Into<String>) -> Self {
        self.model_key = key.into();
        self
    }

    pub fn min_confidence(mut self, threshold: f64) -> Self {
        self.min_confidence = threshold;
        self
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".into()));
        }
        if self.overflow_policy != OverflowPolicy::Unbounded && self.queue_capacity == 0 {
            return Err(Error::Config(format!(
                "queue capacity must be at least 1 with policy {}",
                self.overflow_policy
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::Config(format!(
                "min confidence {} outside [0, 1]",
                self.min_confidence
            )));
        }
        if self.ping_interval.is_zero() {
            return Err(Error::Config("ping interval must be non-zero".into()));
        }
        if !self.socketio_path.starts_with('/') {
            return Err(Error::Config(format!(
                "socket.io path '{}' must start with '/'",
                self.socketio_path
            )));
        }
        if self.cors_allowed_origins.is_empty() {
            return Err(Error::Config(
                "at least one allowed origin is required (use '*' for any)".into(),
            ));
        }
        Ok(())
    }

    pub fn handoff_config(&self) -> HandoffConfig {
        match self.overflow_policy {
            OverflowPolicy::Unbounded => HandoffConfig::unbounded(),
            policy => HandoffConfig::bounded(self.queue_capacity, policy),
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default()
            .publish_timeout(self.publish_timeout)
            .outbound_capacity(self.outbound_capacity)
    }

    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig::default()
            .poll_interval(self.poll_interval)
            .drain_mode(self.drain_mode)
    }

    pub fn extractor(&self) -> ResultExtractor {
        ResultExtractor::new()
            .with_model_key(self.model_key.clone())
            .min_confidence(self.min_confidence)
    }
}
