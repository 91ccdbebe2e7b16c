//! Registry configuration

use std::time::Duration;

/// Configuration for the subscriber registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a subscriber's queue may stay full before it is evicted
    pub publish_timeout: Duration,

    /// Events buffered per subscriber before events are skipped for it
    pub outbound_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_millis(250),
            outbound_capacity: 32,
        }
    }
}

impl RegistryConfig {
    /// Set how long a stalled subscriber is kept
    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Set the per-subscriber queue depth (minimum 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }
}
