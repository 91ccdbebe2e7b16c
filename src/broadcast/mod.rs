//! Fixed-cadence broadcaster
//!
//! Bridges the producer side and the subscriber side: on every tick it pops
//! pending batches from the `HandoffChannel` and publishes them through the
//! `SubscriberRegistry` as `handPosition` events.
//!
//! ```text
//! HandoffChannel ──pop()──► BroadcastLoop ──broadcast()──► SubscriberRegistry
//!                            (every 20ms)
//! ```

pub mod config;
pub mod scheduler;

pub use config::{BroadcastConfig, DrainMode, DEFAULT_POLL_INTERVAL};
pub use scheduler::BroadcastLoop;
