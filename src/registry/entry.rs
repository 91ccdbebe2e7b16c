//! Subscriber entry types
//!
//! This module defines the per-subscriber state stored in the registry.

use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::event::BroadcastEvent;
use crate::protocol::WireProtocol;

/// Opaque subscriber identifier
///
/// For Socket.IO clients this is the socket id sent in the connect ack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only view of a connected subscriber
#[derive(Debug, Clone)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub peer_addr: SocketAddr,
    pub protocol: WireProtocol,
    /// Wall-clock connect time
    pub connected_at: SystemTime,
    /// Monotonic connect time, for durations
    pub(super) connected_instant: Instant,
}

impl SubscriberInfo {
    pub fn new(id: SubscriberId, peer_addr: SocketAddr, protocol: WireProtocol) -> Self {
        Self {
            id,
            peer_addr,
            protocol,
            connected_at: SystemTime::now(),
            connected_instant: Instant::now(),
        }
    }

    /// How long this subscriber has been connected
    pub fn connected_for(&self) -> Duration {
        self.connected_instant.elapsed()
    }
}

/// Entry for one subscriber in the registry
pub(super) struct SubscriberEntry {
    pub(super) info: SubscriberInfo,

    /// Outbound queue drained by the connection task
    pub(super) tx: mpsc::Sender<BroadcastEvent>,

    /// When the outbound queue was first found full, cleared on the next
    /// successful send
    pub(super) stalled_since: Mutex<Option<Instant>>,
}

impl SubscriberEntry {
    pub(super) fn new(
        info: SubscriberInfo,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<BroadcastEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let entry = Self {
            info,
            tx,
            stalled_since: Mutex::new(None),
        };
        (entry, rx)
    }
}
