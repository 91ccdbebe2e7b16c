//! Relay server lifecycle
//!
//! Wires the producer thread, the broadcast loop and the listener together
//! and runs them until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::broadcast::BroadcastLoop;
use crate::error::Result;
use crate::handoff::HandoffChannel;
use crate::producer::{prediction_sink, InferenceEngine, ProducerHandle, StopToken};
use crate::registry::SubscriberRegistry;
use crate::server::config::RelayConfig;
use crate::server::listener::Listener;
use crate::stats::{log_summary, RelayStats};

/// The hand-position relay
///
/// Binding is separate from running so callers learn the actual address (and
/// see bind failures) before the engine is started.
pub struct RelayServer {
    config: Arc<RelayConfig>,
    listener: Listener,
    channel: Arc<HandoffChannel>,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
}

impl RelayServer {
    /// Validate `config` and bind the listening socket
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let channel = Arc::new(HandoffChannel::new(config.handoff_config()));
        let registry = Arc::new(SubscriberRegistry::with_config(config.registry_config()));
        let stats = Arc::new(RelayStats::new());

        let listener = Listener::bind(config.clone(), registry.clone(), stats.clone()).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            overflow = %config.overflow_policy,
            queue_capacity = config.queue_capacity,
            "Relay listening"
        );

        Ok(Self {
            config,
            listener,
            channel,
            registry,
            stats,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn channel(&self) -> &Arc<HandoffChannel> {
        &self.channel
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Run until Ctrl-C
    pub async fn run<E: InferenceEngine>(self, engine: E) -> Result<()> {
        self.run_until(engine, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves
    ///
    /// Fails only at startup (engine start). Once serving, component failures
    /// are logged and shutdown proceeds within `shutdown_timeout` per step.
    pub async fn run_until<E, F>(self, engine: E, shutdown: F) -> Result<()>
    where
        E: InferenceEngine,
        F: Future<Output = ()>,
    {
        let RelayServer {
            config,
            listener,
            channel,
            registry,
            stats,
        } = self;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sink = prediction_sink(config.extractor(), channel.clone(), stats.clone());
        let mut producer = ProducerHandle::spawn(engine, sink, StopToken::new()).await?;

        let mut broadcaster = BroadcastLoop::new(
            channel.clone(),
            registry.clone(),
            stats.clone(),
            config.broadcast_config(),
        )
        .spawn(shutdown_rx.clone());

        let reporter = spawn_stats_reporter(&config, &channel, &registry, &stats);
        let mut connections = JoinSet::new();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                exit = producer.exited() => match exit {
                    Ok(()) => tracing::warn!("Producer exited, still serving subscribers"),
                    Err(e) => tracing::error!(error = %e, "Producer failed, still serving subscribers"),
                },
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        listener.handle_connection(socket, peer_addr, shutdown_rx.clone(), &mut connections);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                    }
                }
            }
        }

        // Stop accepting before anything else
        drop(listener);
        let _ = shutdown_tx.send(true);
        let grace = config.shutdown_timeout;

        if timeout(grace, &mut broadcaster).await.is_err() {
            tracing::warn!("Broadcast loop did not stop in time");
            broadcaster.abort();
        }

        let drained = timeout(grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "Connections did not close in time, aborting"
            );
            connections.abort_all();
        }

        producer.shutdown(grace).await;

        if let Some(reporter) = reporter {
            reporter.abort();
        }
        log_summary(&stats.snapshot(), &channel.stats(), registry.subscriber_count().await);
        tracing::info!("Relay stopped");

        Ok(())
    }
}

fn spawn_stats_reporter(
    config: &RelayConfig,
    channel: &Arc<HandoffChannel>,
    registry: &Arc<SubscriberRegistry>,
    stats: &Arc<RelayStats>,
) -> Option<JoinHandle<()>> {
    if config.stats_interval.is_zero() {
        return None;
    }

    let period = config.stats_interval;
    let channel = channel.clone();
    let registry = registry.clone();
    let stats = stats.clone();

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            log_summary(
                &stats.snapshot(),
                &channel.stats(),
                registry.subscriber_count().await,
            );
        }
    }))
}
