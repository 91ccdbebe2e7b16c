//! Lock-protected FIFO mailbox

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::policy::{HandoffConfig, OverflowPolicy};
use crate::detection::DetectionBatch;

/// A batch waiting in the channel
#[derive(Debug, Clone)]
pub struct QueuedBatch {
    /// Push order, assigned under the lock
    pub seq: u64,
    /// When the producer pushed it
    pub enqueued_at: Instant,
    pub batch: DetectionBatch,
}

impl QueuedBatch {
    /// Time spent waiting in the channel so far
    pub fn queued_for(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended with room to spare
    Enqueued,
    /// Appended after evicting the oldest pending batch
    EvictedOldest,
    /// Rejected because the channel is full
    DroppedNewest,
    /// Empty batches are never enqueued
    Ignored,
}

/// Counters since the channel was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoffStats {
    pub enqueued: u64,
    pub evicted: u64,
    pub dropped: u64,
    pub pending: usize,
}

struct Inner {
    queue: VecDeque<QueuedBatch>,
    next_seq: u64,
    enqueued: u64,
    evicted: u64,
    dropped: u64,
}

/// Mailbox between the producer thread and the broadcast loop
///
/// Shared as `Arc<HandoffChannel>`. Multiple producers are tolerated: sequence
/// numbers are assigned while holding the lock, so the queue carries a single
/// total order.
pub struct HandoffChannel {
    inner: Mutex<Inner>,
    config: HandoffConfig,
}

impl HandoffChannel {
    pub fn new(config: HandoffConfig) -> Self {
        let initial = config.limit().unwrap_or(16).min(1024);
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(initial),
                next_seq: 0,
                enqueued: 0,
                evicted: 0,
                dropped: 0,
            }),
            config,
        }
    }

    /// Channel without a capacity limit
    pub fn unbounded() -> Self {
        Self::new(HandoffConfig::unbounded())
    }

    pub fn config(&self) -> &HandoffConfig {
        &self.config
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.config.policy
    }

    /// Hand a batch over to the broadcaster
    ///
    /// Never blocks beyond the internal lock.
    pub fn push(&self, batch: DetectionBatch) -> PushOutcome {
        if batch.is_empty() {
            return PushOutcome::Ignored;
        }

        let mut inner = self.inner.lock();
        let mut outcome = PushOutcome::Enqueued;

        if let Some(limit) = self.config.limit() {
            if inner.queue.len() >= limit {
                match self.config.policy {
                    OverflowPolicy::DropNewest => {
                        inner.dropped += 1;
                        return PushOutcome::DroppedNewest;
                    }
                    _ => {
                        while inner.queue.len() >= limit {
                            inner.queue.pop_front();
                            inner.evicted += 1;
                        }
                        outcome = PushOutcome::EvictedOldest;
                    }
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.enqueued += 1;
        inner.queue.push_back(QueuedBatch {
            seq,
            enqueued_at: Instant::now(),
            batch,
        });

        outcome
    }

    /// Take the oldest pending batch, if any
    pub fn pop(&self) -> Option<QueuedBatch> {
        self.inner.lock().queue.pop_front()
    }

    /// Take every pending batch, oldest first
    pub fn drain(&self) -> Vec<QueuedBatch> {
        self.inner.lock().queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn stats(&self) -> HandoffStats {
        let inner = self.inner.lock();
        HandoffStats {
            enqueued: inner.enqueued,
            evicted: inner.evicted,
            dropped: inner.dropped,
            pending: inner.queue.len(),
        }
    }
}

impl Default for HandoffChannel {
    fn default() -> Self {
        Self::new(HandoffConfig::default())
    }
}

impl std::fmt::Debug for HandoffChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffChannel")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
