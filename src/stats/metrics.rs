//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::handoff::HandoffStats;

/// Relay-wide counters
///
/// Updated from both the producer thread and the async side, so every field is
/// an atomic with relaxed ordering; the numbers are for reporting only.
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    frames_processed: AtomicU64,
    extract_failures: AtomicU64,
    batches_published: AtomicU64,
    records_published: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_processed: AtomicU64::new(0),
            extract_failures: AtomicU64::new(0),
            batches_published: AtomicU64::new(0),
            records_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            connections_accepted: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
        }
    }

    pub fn record_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extract_failure(&self) {
        self.extract_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// One batch went out to `delivered` subscribers, `failed` missed it
    pub fn record_publish(&self, records: usize, delivered: usize, failed: usize) {
        self.batches_published.fetch_add(1, Ordering::Relaxed);
        self.records_published
            .fetch_add(records as u64, Ordering::Relaxed);
        self.deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.uptime(),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            extract_failures: self.extract_failures.load(Ordering::Relaxed),
            batches_published: self.batches_published.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain copy of `RelayStats`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub frames_processed: u64,
    pub extract_failures: u64,
    pub batches_published: u64,
    pub records_published: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub connections_accepted: u64,
    pub connections_rejected: u64,
}

impl StatsSnapshot {
    /// Average processed frames per second since start
    pub fn frame_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Log one summary line
pub fn log_summary(stats: &StatsSnapshot, handoff: &HandoffStats, subscribers: usize) {
    tracing::info!(
        uptime_secs = stats.uptime.as_secs(),
        frames = stats.frames_processed,
        fps = format_args!("{:.1}", stats.frame_rate()),
        extract_failures = stats.extract_failures,
        batches_published = stats.batches_published,
        queue_pending = handoff.pending,
        queue_evicted = handoff.evicted,
        queue_dropped = handoff.dropped,
        deliveries = stats.deliveries,
        delivery_failures = stats.delivery_failures,
        subscribers = subscribers,
        "Relay stats"
    );
}
