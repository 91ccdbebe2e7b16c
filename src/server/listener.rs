//! TCP listener
//!
//! Accepts sockets, enforces the connection limit and spawns one
//! `Connection` task per subscriber.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::error::Result;
use crate::registry::SubscriberRegistry;
use crate::server::config::RelayConfig;
use crate::server::connection::Connection;
use crate::stats::RelayStats;

/// Bound listening socket plus what each connection needs
pub struct Listener {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Bind to `config.bind_addr`
    pub async fn bind(
        config: Arc<RelayConfig>,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<RelayStats>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            listener,
            config,
            registry,
            stats,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }

    /// Spawn the connection task for an accepted socket into `tasks`
    pub fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        shutdown: watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats.record_rejection();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.stats.record_connection();

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(
            session_id,
            peer_addr,
            Arc::clone(&self.config),
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
            shutdown,
        );

        tasks.spawn(async move {
            let _permit = permit;
            if let Err(e) = connection.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection ended with error"
                );
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
