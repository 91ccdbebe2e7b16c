//! Per-subscriber WebSocket connection
//!
//! One task per accepted socket. The task performs the upgrade, registers the
//! subscriber, then multiplexes in a single `select!` loop:
//! - inbound frames (Socket.IO control packets, client close)
//! - outbound events from the registry queue
//! - the Engine.IO heartbeat (Socket.IO only)
//! - the server shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::{Error, Result};
use crate::protocol::engineio::{self, ClientPacket, OpenPacket};
use crate::protocol::{
    negotiate, origin_allowed, HandshakeRejection, WireProtocol, DEFAULT_NAMESPACE,
};
use crate::registry::{BroadcastEvent, SubscriberId, SubscriberRegistry};
use crate::server::config::RelayConfig;
use crate::stats::RelayStats;

/// Why the serve loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    ClientClosed,
    Shutdown,
    PingTimeout,
    Evicted,
    Malformed,
}

impl Exit {
    fn as_str(&self) -> &'static str {
        match self {
            Exit::ClientClosed => "client closed",
            Exit::Shutdown => "server shutdown",
            Exit::PingTimeout => "ping timeout",
            Exit::Evicted => "removed from registry",
            Exit::Malformed => "malformed packet",
        }
    }
}

struct Session {
    ws: WebSocketStream<TcpStream>,
    protocol: WireProtocol,
    subscriber: Option<SubscriberId>,
    outbound: Option<mpsc::Receiver<BroadcastEvent>>,
    last_pong: Instant,
}

/// A single subscriber connection
pub struct Connection {
    session_id: u64,
    peer_addr: SocketAddr,
    config: Arc<RelayConfig>,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: Arc<RelayConfig>,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<RelayStats>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            config,
            registry,
            stats,
            shutdown,
        }
    }

    /// Upgrade, serve until closed, then deregister
    ///
    /// A refused upgrade is not an error.
    pub async fn run(mut self, socket: TcpStream) -> Result<()> {
        let Some((ws, protocol)) = self.upgrade(socket).await? else {
            return Ok(());
        };

        let mut session = Session {
            ws,
            protocol,
            subscriber: None,
            outbound: None,
            last_pong: Instant::now(),
        };

        let result = self.serve(&mut session).await;

        if let Some(id) = session.subscriber.take() {
            self.registry.on_disconnect(&id).await;
        }

        let exit = match result {
            Ok(exit) => exit,
            Err(e) => {
                tracing::debug!(session_id = self.session_id, error = %e, "Connection error");
                return Err(e);
            }
        };

        if exit == Exit::Shutdown && session.protocol == WireProtocol::SocketIo {
            let _ = session
                .ws
                .send(Message::Text(engineio::encode_disconnect()))
                .await;
        }
        let _ = session.ws.close(None).await;

        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            reason = exit.as_str(),
            "Connection closed"
        );
        Ok(())
    }

    async fn upgrade(
        &self,
        socket: TcpStream,
    ) -> Result<Option<(WebSocketStream<TcpStream>, WireProtocol)>> {
        let mut negotiated = None;
        let mut rejected = None;

        let config = &self.config;
        let callback = |request: &Request, response: Response| {
            let origin = request
                .headers()
                .get("origin")
                .and_then(|value| value.to_str().ok());

            let outcome = if origin_allowed(&config.cors_allowed_origins, origin) {
                negotiate(
                    request.uri().path(),
                    request.uri().query(),
                    &config.socketio_path,
                )
            } else {
                Err(HandshakeRejection::forbidden_origin(origin.unwrap_or_default()))
            };

            match outcome {
                Ok(protocol) => {
                    negotiated = Some(protocol);
                    Ok(response)
                }
                Err(rejection) => {
                    let response = error_response(&rejection);
                    rejected = Some(rejection);
                    Err(response)
                }
            }
        };

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_payload);
        ws_config.max_frame_size = Some(config.max_payload);

        let handshake =
            tokio_tungstenite::accept_hdr_async_with_config(socket, callback, Some(ws_config));
        let accepted = match tokio::time::timeout(config.handshake_timeout, handshake).await {
            Ok(accepted) => accepted,
            Err(_) => return Err(Error::HandshakeTimeout),
        };

        match (accepted, negotiated) {
            (Ok(ws), Some(protocol)) => Ok(Some((ws, protocol))),
            (Ok(_), None) => Ok(None),
            (Err(e), _) => match rejected {
                Some(rejection) => {
                    self.stats.record_rejection();
                    tracing::warn!(
                        session_id = self.session_id,
                        peer = %self.peer_addr,
                        status = rejection.status,
                        reason = %rejection.reason,
                        "Handshake rejected"
                    );
                    Ok(None)
                }
                None => Err(e.into()),
            },
        }
    }

    async fn serve(&mut self, session: &mut Session) -> Result<Exit> {
        match session.protocol {
            WireProtocol::SocketIo => {
                let open = OpenPacket {
                    sid: SubscriberId::generate().to_string(),
                    ping_interval: self.config.ping_interval,
                    ping_timeout: self.config.ping_timeout,
                    max_payload: self.config.max_payload,
                };
                session.ws.send(Message::Text(open.encode())).await?;
            }
            WireProtocol::PlainJson => {
                let id = SubscriberId::generate();
                self.register(session, id).await;
            }
        }

        let ping_interval = self.config.ping_interval;
        let pong_deadline = ping_interval + self.config.ping_timeout;
        let heartbeat = session.protocol == WireProtocol::SocketIo;
        let mut pinger = interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
        pinger.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *self.shutdown.borrow() {
                return Ok(Exit::Shutdown);
            }

            tokio::select! {
                inbound = session.ws.next() => {
                    let message = match inbound {
                        Some(message) => message?,
                        None => return Ok(Exit::ClientClosed),
                    };
                    if let Some(exit) = self.handle_message(session, message).await? {
                        return Ok(exit);
                    }
                }
                event = next_event(&mut session.outbound) => {
                    let Some(event) = event else {
                        return Ok(Exit::Evicted);
                    };
                    let text = session.protocol.frame_event(&event);
                    session.ws.send(Message::Text(text)).await?;
                }
                _ = pinger.tick(), if heartbeat => {
                    if session.last_pong.elapsed() > pong_deadline {
                        return Ok(Exit::PingTimeout);
                    }
                    session.ws.send(Message::Text(engineio::encode_ping())).await?;
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(Exit::Shutdown);
                    }
                }
            }
        }
    }

    async fn handle_message(
        &self,
        session: &mut Session,
        message: Message,
    ) -> Result<Option<Exit>> {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(Some(Exit::ClientClosed)),
            // Control frames are answered by tungstenite itself
            _ => return Ok(None),
        };

        if session.protocol == WireProtocol::PlainJson {
            tracing::trace!(session_id = self.session_id, "Ignoring client message");
            return Ok(None);
        }

        let packet = match engineio::decode(&text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(session_id = self.session_id, error = %e, "Malformed packet");
                return Ok(Some(Exit::Malformed));
            }
        };

        match packet {
            ClientPacket::Close => return Ok(Some(Exit::ClientClosed)),
            ClientPacket::Ping(payload) => {
                session
                    .ws
                    .send(Message::Text(engineio::encode_pong(&payload)))
                    .await?;
            }
            ClientPacket::Pong(_) => session.last_pong = Instant::now(),
            ClientPacket::Noop => {}
            ClientPacket::Connect { namespace } if namespace == DEFAULT_NAMESPACE => {
                if session.subscriber.is_none() {
                    let id = SubscriberId::generate();
                    let ack = engineio::encode_connect_ack(id.as_str());
                    self.register(session, id).await;
                    session.ws.send(Message::Text(ack)).await?;
                }
            }
            ClientPacket::Connect { namespace } => {
                tracing::debug!(
                    session_id = self.session_id,
                    namespace = %namespace,
                    "Refusing unknown namespace"
                );
                let refusal = engineio::encode_connect_error(&namespace, "Invalid namespace");
                session.ws.send(Message::Text(refusal)).await?;
            }
            ClientPacket::Disconnect { namespace } if namespace == DEFAULT_NAMESPACE => {
                return Ok(Some(Exit::ClientClosed));
            }
            ClientPacket::Disconnect { .. } => {}
            ClientPacket::Event { namespace, .. } | ClientPacket::Other { namespace, .. } => {
                tracing::trace!(
                    session_id = self.session_id,
                    namespace = %namespace,
                    "Ignoring client packet"
                );
            }
        }

        Ok(None)
    }

    async fn register(&self, session: &mut Session, id: SubscriberId) {
        match self
            .registry
            .on_connect(id.clone(), self.peer_addr, session.protocol)
            .await
        {
            Ok(rx) => {
                session.subscriber = Some(id);
                session.outbound = Some(rx);
            }
            Err(e) => {
                tracing::error!(
                    session_id = self.session_id,
                    error = %e,
                    "Failed to register subscriber"
                );
            }
        }
    }
}

/// Next queued event, or pending forever while unregistered
async fn next_event(
    outbound: &mut Option<mpsc::Receiver<BroadcastEvent>>,
) -> Option<BroadcastEvent> {
    match outbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn error_response(rejection: &HandshakeRejection) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(rejection.reason.clone()));
    *response.status_mut() =
        StatusCode::from_u16(rejection.status).unwrap_or(StatusCode::BAD_REQUEST);
    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::{connect_async, MaybeTlsStream};

    use super::*;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct Harness {
        addr: SocketAddr,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<RelayStats>,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<Result<()>>,
    }

    async fn serve_one(config: RelayConfig) -> Harness {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let registry = Arc::new(SubscriberRegistry::new());
        let stats = Arc::new(RelayStats::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let connection_registry = registry.clone();
        let connection_stats = stats.clone();
        let task = tokio::spawn(async move {
            let (socket, peer) = listener.accept().await?;
            Connection::new(
                1,
                peer,
                Arc::new(config),
                connection_registry,
                connection_stats,
                shutdown_rx,
            )
            .run(socket)
            .await
        });

        Harness {
            addr,
            registry,
            stats,
            shutdown,
            task,
        }
    }

    async fn next_text(client: &mut Client) -> String {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = message {
                return text;
            }
        }
    }

    async fn wait_for_subscribers(registry: &SubscriberRegistry, count: usize) {
        for _ in 0..100 {
            if registry.subscriber_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} subscribers");
    }

    async fn socketio_client(addr: SocketAddr) -> Client {
        let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_socketio_connect_and_receive() {
        let harness = serve_one(RelayConfig::default()).await;
        let mut client = socketio_client(harness.addr).await;

        let open = next_text(&mut client).await;
        assert!(open.starts_with("0{"));
        assert!(open.contains("\"pingInterval\":25000"));

        client.send(Message::Text("40".into())).await.unwrap();
        let ack = next_text(&mut client).await;
        assert!(ack.starts_with("40{\"sid\":"));

        wait_for_subscribers(&harness.registry, 1).await;
        harness
            .registry
            .broadcast("handPosition", &serde_json::json!([{"x": 1.0}]))
            .await
            .unwrap();

        assert_eq!(next_text(&mut client).await, r#"42["handPosition",[{"x":1.0}]]"#);

        client.send(Message::Text("2".into())).await.unwrap();
        assert_eq!(next_text(&mut client).await, "3");

        client.send(Message::Text("41".into())).await.unwrap();
        harness.task.await.unwrap().unwrap();
        assert_eq!(harness.registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_namespace_refused() {
        let harness = serve_one(RelayConfig::default()).await;
        let mut client = socketio_client(harness.addr).await;
        next_text(&mut client).await;

        client.send(Message::Text("40/admin,".into())).await.unwrap();
        let refusal = next_text(&mut client).await;
        assert!(refusal.starts_with("44/admin,"));
        assert!(refusal.contains("Invalid namespace"));
        assert_eq!(harness.registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_plain_json_registered_on_upgrade() {
        let harness = serve_one(RelayConfig::default()).await;
        let (mut client, _) = connect_async(format!("ws://{}/", harness.addr))
            .await
            .unwrap();

        wait_for_subscribers(&harness.registry, 1).await;
        harness
            .registry
            .broadcast("handPosition", &serde_json::json!([]))
            .await
            .unwrap();

        assert_eq!(
            next_text(&mut client).await,
            r#"{"event":"handPosition","data":[]}"#
        );
    }

    #[tokio::test]
    async fn test_disallowed_origin_rejected() {
        let config = RelayConfig::default().cors_allowed_origins(["http://localhost:3000"]);
        let harness = serve_one(config).await;

        let mut request = format!("ws://{}/socket.io/?EIO=4&transport=websocket", harness.addr)
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("Origin", HeaderValue::from_static("http://evil.example"));

        let err = connect_async(request).await.unwrap_err();
        match err {
            tokio_tungstenite::tungstenite::Error::Http(response) => {
                assert_eq!(response.status().as_u16(), 403)
            }
            other => panic!("unexpected error: {other}"),
        }

        harness.task.await.unwrap().unwrap();
        assert_eq!(harness.stats.snapshot().connections_rejected, 1);
    }

    #[tokio::test]
    async fn test_wrong_engineio_version_rejected() {
        let harness = serve_one(RelayConfig::default()).await;
        let url = format!("ws://{}/socket.io/?EIO=3&transport=websocket", harness.addr);

        let err = connect_async(url).await.unwrap_err();
        assert!(matches!(
            err,
            tokio_tungstenite::tungstenite::Error::Http(ref response) if response.status().as_u16() == 400
        ));
    }

    #[tokio::test]
    async fn test_missing_pong_disconnects() {
        let config = RelayConfig::default()
            .heartbeat(Duration::from_millis(50), Duration::from_millis(50));
        let harness = serve_one(config).await;
        let mut client = socketio_client(harness.addr).await;
        next_text(&mut client).await;
        client.send(Message::Text("40".into())).await.unwrap();
        wait_for_subscribers(&harness.registry, 1).await;

        // Read (and ignore) pings without answering until the server gives up
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(Ok(message)) = client.next().await {
                if message.is_close() {
                    break;
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        harness.task.await.unwrap().unwrap();
        assert_eq!(harness.registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_sends_disconnect() {
        let harness = serve_one(RelayConfig::default()).await;
        let mut client = socketio_client(harness.addr).await;
        next_text(&mut client).await;
        client.send(Message::Text("40".into())).await.unwrap();
        next_text(&mut client).await;

        harness.shutdown.send(true).unwrap();
        assert_eq!(next_text(&mut client).await, "41");

        harness.task.await.unwrap().unwrap();
        assert_eq!(harness.registry.subscriber_count().await, 0);
    }
}
