//! # hand-relay
//!
//! Relays live hand-detection results from a frame-processing engine to any
//! number of WebSocket subscribers at a fixed broadcast cadence.
//!
//! ```text
//!   [relay-producer thread]                 [tokio runtime]
//!   InferenceEngine                         BroadcastLoop (20ms tick)
//!     │ on_prediction(raw, frame)             │ pop()
//!     ▼                                       ▼
//!   ResultExtractor ──push()──► HandoffChannel ──► SubscriberRegistry
//!                                                     │ per-subscriber mpsc
//!                                                     ▼
//!                                       Connection tasks ──► WebSocket / Socket.IO
//! ```
//!
//! The producer never waits on the network side: `HandoffChannel::push` only
//! takes a short lock. The broadcaster never waits on the producer: it polls
//! the channel on its own timer.
//!
//! # Example
//!
//! ```no_run
//! use hand_relay::producer::{ReplayEngine, VideoSourceProperties};
//! use hand_relay::{RelayConfig, RelayServer};
//!
//! # async fn example() -> hand_relay::error::Result<()> {
//! let config = RelayConfig::default();
//! let engine = ReplayEngine::new("frames.ndjson", VideoSourceProperties::default());
//!
//! let server = RelayServer::bind(config).await?;
//! server.run(engine).await
//! # }
//! ```

pub mod broadcast;
pub mod detection;
pub mod error;
pub mod handoff;
pub mod producer;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use detection::{DetectionBatch, DetectionRecord, ResultExtractor};
pub use error::{Error, Result};
pub use handoff::{HandoffChannel, OverflowPolicy};
pub use registry::SubscriberRegistry;
pub use server::{RelayConfig, RelayServer};
