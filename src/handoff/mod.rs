//! Producer → broadcaster handoff
//!
//! The handoff channel is the only state shared between the producer thread
//! and the async side. It is a FIFO mailbox guarded by a `parking_lot::Mutex`;
//! both `push` and `pop` hold the lock only for a `VecDeque` operation, so the
//! producer callback never waits on network I/O.
//!
//! # Overflow
//!
//! When the broadcaster falls behind, batches accumulate. What happens at
//! capacity is an explicit `OverflowPolicy`:
//!
//! | Policy       | At capacity                   | Favors       |
//! |--------------|-------------------------------|--------------|
//! | `DropOldest` | evict the oldest pending batch | freshness    |
//! | `DropNewest` | reject the incoming batch      | completeness |
//! | `Unbounded`  | grow without limit             | legacy       |
//!
//! `DropOldest` is the default. Retained batches always keep their push
//! order.

pub mod channel;
pub mod policy;

pub use channel::{HandoffChannel, HandoffStats, PushOutcome, QueuedBatch};
pub use policy::{HandoffConfig, OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
