//! Registry error types

use std::time::Duration;

use thiserror::Error;

use super::entry::SubscriberId;

/// Error type for registry membership operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A subscriber with this id is already registered
    #[error("Subscriber already registered: {0}")]
    DuplicateSubscriber(SubscriberId),
}

/// Why one subscriber did not receive a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The subscriber's connection task is gone
    #[error("subscriber channel closed")]
    Closed,

    /// The subscriber's queue is full; this event is skipped for it
    #[error("subscriber queue full")]
    Full,

    /// The subscriber's queue has stayed full for longer than the publish
    /// timeout
    #[error("subscriber stalled for longer than {0:?}")]
    TimedOut(Duration),
}
