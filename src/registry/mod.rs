//! Subscriber registry for event fan-out
//!
//! The registry tracks connected subscribers and delivers broadcast events to
//! each of them through a bounded per-subscriber queue.
//!
//! A broadcast never waits on a subscriber. A full queue skips the event for
//! that subscriber only; a queue that stays full past `publish_timeout`
//! gets the subscriber evicted, which closes its connection.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SubscriberRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ subscribers: HashMap<Id,     │
//!                  │   SubscriberEntry {          │
//!                  │     info,                    │
//!                  │     tx: mpsc::Sender<Event>, │
//!                  │   }                          │
//!                  │ >                            │
//!                  └──────────────┬───────────────┘
//!                                 │
//!      [BroadcastLoop]            │ try_send to each under
//!      registry.broadcast() ──────┤ the read lock, never waiting
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!    [Connection]            [Connection]            [Connection]
//!    rx.recv() ──► ws        rx.recv() ──► ws        rx.recv() ──► ws
//! ```
//!
//! # Shared payloads
//!
//! A `BroadcastEvent` holds its JSON payload as `Arc<str>`. The payload is
//! serialized once per broadcast; each subscriber only bumps a reference
//! count and frames it for its own wire protocol.

pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{SubscriberId, SubscriberInfo};
pub use error::{PublishError, RegistryError};
pub use event::BroadcastEvent;
pub use store::{BroadcastReport, SubscriberRegistry};
