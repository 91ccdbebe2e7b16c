//! Subscriber registry implementation
//!
//! The central registry that tracks connected subscribers and fans broadcast
//! events out to them.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::entry::{SubscriberEntry, SubscriberId, SubscriberInfo};
use super::error::{PublishError, RegistryError};
use super::event::BroadcastEvent;
use crate::protocol::WireProtocol;

/// Per-broadcast delivery summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers whose queue accepted the event
    pub delivered: usize,
    /// Subscribers that were closed, full or stalled
    pub failed: usize,
}

impl BroadcastReport {
    /// Subscribers targeted by the broadcast
    pub fn targeted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Registry of connected subscribers
///
/// Thread-safe via `RwLock`. Broadcasting holds the read lock only for a pass
/// of non-blocking sends, so joins and leaves are never held up by a slow
/// subscriber.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, SubscriberEntry>>,
    config: RegistryConfig,
}

impl SubscriberRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a newly connected subscriber
    ///
    /// Returns the receiver the connection task drains. Only events broadcast
    /// after this call are delivered.
    pub async fn on_connect(
        &self,
        id: SubscriberId,
        peer_addr: SocketAddr,
        protocol: WireProtocol,
    ) -> Result<mpsc::Receiver<BroadcastEvent>, RegistryError> {
        let mut subscribers = self.subscribers.write().await;

        if subscribers.contains_key(&id) {
            return Err(RegistryError::DuplicateSubscriber(id));
        }

        let info = SubscriberInfo::new(id.clone(), peer_addr, protocol);
        let (entry, rx) = SubscriberEntry::new(info, self.config.outbound_capacity);
        subscribers.insert(id.clone(), entry);

        tracing::info!(
            subscriber = %id,
            peer = %peer_addr,
            protocol = %protocol,
            subscribers = subscribers.len(),
            "Client connected"
        );

        Ok(rx)
    }

    /// Remove a subscriber
    ///
    /// Returns its info if it was still registered. Removing an unknown id is
    /// a no-op.
    pub async fn on_disconnect(&self, id: &SubscriberId) -> Option<SubscriberInfo> {
        let mut subscribers = self.subscribers.write().await;
        let removed = subscribers.remove(id).map(|entry| entry.info);

        if let Some(ref info) = removed {
            tracing::info!(
                subscriber = %id,
                peer = %info.peer_addr,
                connected_secs = info.connected_for().as_secs(),
                subscribers = subscribers.len(),
                "Client disconnected"
            );
        }

        removed
    }

    /// Serialize `payload` once and deliver it as `event_name` to every
    /// current subscriber
    pub async fn broadcast<T: Serialize + ?Sized>(
        &self,
        event_name: &str,
        payload: &T,
    ) -> Result<BroadcastReport, serde_json::Error> {
        let event = BroadcastEvent::new(event_name, payload)?;
        Ok(self.publish(event).await)
    }

    /// Deliver a prepared event to every current subscriber
    ///
    /// Sends never wait: a subscriber with a full queue misses this event
    /// and the others are unaffected. Subscribers whose queue is closed, or
    /// has stayed full for longer than `publish_timeout`, are removed.
    pub async fn publish(&self, event: BroadcastEvent) -> BroadcastReport {
        let timeout = self.config.publish_timeout;
        let now = Instant::now();
        let mut report = BroadcastReport::default();
        let mut evicted = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, entry) in subscribers.iter() {
                let result = match entry.tx.try_send(event.clone()) {
                    Ok(()) => {
                        *entry.stalled_since.lock() = None;
                        Ok(())
                    }
                    Err(TrySendError::Closed(_)) => Err(PublishError::Closed),
                    Err(TrySendError::Full(_)) => {
                        let mut stalled_since = entry.stalled_since.lock();
                        let since = *stalled_since.get_or_insert(now);
                        if now.duration_since(since) >= timeout {
                            Err(PublishError::TimedOut(timeout))
                        } else {
                            Err(PublishError::Full)
                        }
                    }
                };

                match result {
                    Ok(()) => report.delivered += 1,
                    Err(PublishError::Full) => {
                        report.failed += 1;
                        tracing::debug!(
                            subscriber = %id,
                            event = event.name(),
                            "Subscriber queue full, skipping event"
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            subscriber = %id,
                            event = event.name(),
                            error = %e,
                            "Publish to subscriber failed"
                        );
                        evicted.push(id.clone());
                    }
                }
            }
        }

        if !evicted.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in evicted {
                if subscribers.remove(&id).is_some() {
                    tracing::debug!(subscriber = %id, "Removed subscriber");
                }
            }
        }

        report
    }

    /// Number of connected subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(id)
    }

    /// Snapshot of all connected subscribers
    pub async fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.subscribers
            .read()
            .await
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
