//! The tick loop

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::config::{BroadcastConfig, DrainMode};
use crate::handoff::{HandoffChannel, QueuedBatch};
use crate::registry::SubscriberRegistry;
use crate::stats::RelayStats;

/// Publishes pending batches on a fixed cadence
pub struct BroadcastLoop {
    channel: Arc<HandoffChannel>,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
    config: BroadcastConfig,
}

impl BroadcastLoop {
    pub fn new(
        channel: Arc<HandoffChannel>,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<RelayStats>,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            channel,
            registry,
            stats,
            config,
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// One tick: pop per the drain mode and publish in order
    ///
    /// Returns the number of batches published. An empty channel is a no-op.
    pub async fn tick(&self) -> usize {
        let pending: Vec<QueuedBatch> = match self.config.drain_mode {
            DrainMode::OnePerTick => self.channel.pop().into_iter().collect(),
            DrainMode::All => self.channel.drain(),
        };

        let count = pending.len();
        for queued in pending {
            self.publish(queued).await;
        }
        count
    }

    async fn publish(&self, queued: QueuedBatch) {
        let records = queued.batch.len();
        match self
            .registry
            .broadcast(&self.config.event_name, &queued.batch)
            .await
        {
            Ok(report) => {
                self.stats
                    .record_publish(records, report.delivered, report.failed);
                tracing::debug!(
                    seq = queued.seq,
                    records = records,
                    delivered = report.delivered,
                    failed = report.failed,
                    latency_ms = queued.queued_for().as_millis() as u64,
                    "Published batch"
                );
            }
            Err(e) => {
                tracing::error!(seq = queued.seq, error = %e, "Failed to serialize batch");
            }
        }
    }

    /// Tick until `shutdown` flips to `true` or its sender is dropped
    ///
    /// Missed ticks are delayed rather than replayed in a burst.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            drain_mode = %self.config.drain_mode,
            event = %self.config.event_name,
            "Broadcast loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            pending = self.channel.len(),
            "Broadcast loop stopped"
        );
    }

    /// Run on the current tokio runtime
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
