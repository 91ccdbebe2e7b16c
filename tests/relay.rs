//! End-to-end relay tests over real sockets

use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use hand_relay::producer::{
    EngineError, InferenceEngine, PredictionSink, RawFrameResult, StopToken, VideoFrame,
};
use hand_relay::{RelayConfig, RelayServer, SubscriberRegistry};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Engine fed by the test through a channel
struct ChannelEngine {
    frames: Option<std_mpsc::Receiver<RawFrameResult>>,
    ignore_stop: bool,
    worker: Option<JoinHandle<()>>,
}

impl ChannelEngine {
    fn new() -> (Self, std_mpsc::Sender<RawFrameResult>) {
        let (tx, rx) = std_mpsc::channel();
        let engine = Self {
            frames: Some(rx),
            ignore_stop: false,
            worker: None,
        };
        (engine, tx)
    }
}

impl InferenceEngine for ChannelEngine {
    fn start(&mut self, mut sink: PredictionSink, stop: StopToken) -> Result<(), EngineError> {
        let frames = self.frames.take().ok_or(EngineError::AlreadyStarted)?;
        let ignore_stop = self.ignore_stop;

        self.worker = Some(std::thread::spawn(move || {
            let mut frame_id = 0;
            loop {
                if ignore_stop {
                    // Simulates an engine stuck in a long blocking call
                    std::thread::sleep(Duration::from_secs(30));
                    return;
                }
                if stop.is_stopped() {
                    return;
                }
                match frames.recv_timeout(Duration::from_millis(10)) {
                    Ok(raw) => {
                        frame_id += 1;
                        let frame = VideoFrame {
                            frame_id,
                            frame_timestamp: SystemTime::now(),
                            width: 1920,
                            height: 1080,
                        };
                        sink(&raw, &frame);
                    }
                    Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => return,
                }
            }
        }));
        Ok(())
    }

    fn join(&mut self) -> Result<(), EngineError> {
        self.worker
            .take()
            .ok_or(EngineError::NotStarted)?
            .join()
            .map_err(|_| EngineError::Panicked)
    }
}

struct Running {
    addr: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    stop: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<hand_relay::Result<()>>,
}

async fn start(config: RelayConfig, engine: ChannelEngine) -> Running {
    let config = config.bind("127.0.0.1:0".parse().unwrap());
    let server = RelayServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry().clone();

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server.run_until(engine, async move {
        let _ = stopped.await;
    }));

    Running {
        addr,
        registry,
        stop,
        server,
    }
}

fn two_hands() -> Value {
    json!({
        "model_all": {
            "predictions": {
                "xyxy": [[100, 50, 200, 170], [300, 300, 350, 420]],
                "confidence": [0.93, 0.61],
                "data": { "class_name": ["hand", "hand"] }
            }
        }
    })
}

fn no_hands() -> Value {
    json!({ "model_all": { "predictions": { "xyxy": [], "confidence": [], "data": { "class_name": [] } } } })
}

fn expected_records() -> Value {
    json!([
        {"x": 100.0, "y": 50.0, "width": 100.0, "height": 120.0, "confidence": 0.93, "type": "hand"},
        {"x": 300.0, "y": 300.0, "width": 50.0, "height": 120.0, "confidence": 0.61, "type": "hand"}
    ])
}

async fn next_text(client: &mut Client, wait: Duration) -> Option<String> {
    loop {
        match tokio::time::timeout(wait, client.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(text),
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

async fn wait_for_subscribers(registry: &SubscriberRegistry, count: usize) {
    for _ in 0..200 {
        if registry.subscriber_count().await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} subscribers");
}

async fn socketio_subscriber(addr: SocketAddr) -> Client {
    let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
    let (mut client, _) = connect_async(url).await.unwrap();

    let open = next_text(&mut client, Duration::from_secs(2)).await.unwrap();
    assert!(open.starts_with('0'));
    client.send(Message::Text("40".into())).await.unwrap();
    let ack = next_text(&mut client, Duration::from_secs(2)).await.unwrap();
    assert!(ack.starts_with("40"));
    client
}

/// Parse `42["handPosition",[...]]` into its payload
fn socketio_payload(packet: &str) -> Value {
    let body = packet.strip_prefix("42").expect("not an event packet");
    let mut args: Vec<Value> = serde_json::from_str(body).unwrap();
    assert_eq!(args.len(), 2);
    assert_eq!(args[0], "handPosition");
    args.remove(1)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn socketio_subscriber_receives_hand_positions() {
    let (engine, frames) = ChannelEngine::new();
    let running = start(RelayConfig::default(), engine).await;

    let mut client = socketio_subscriber(running.addr).await;
    wait_for_subscribers(&running.registry, 1).await;

    frames.send(two_hands()).unwrap();
    let packet = next_text(&mut client, Duration::from_secs(2)).await.unwrap();
    assert_eq!(socketio_payload(&packet), expected_records());

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_receive_batches_in_order() {
    let (engine, frames) = ChannelEngine::new();
    let running = start(RelayConfig::default(), engine).await;

    let mut socketio = socketio_subscriber(running.addr).await;
    let (mut plain, _) = connect_async(format!("ws://{}/hands", running.addr))
        .await
        .unwrap();
    wait_for_subscribers(&running.registry, 2).await;

    for x in [10, 20, 30] {
        frames
            .send(json!({
                "model_all": {
                    "predictions": {
                        "xyxy": [[x, 0, x + 5, 5]],
                        "confidence": [0.5],
                        "data": { "class_name": ["hand"] }
                    }
                }
            }))
            .unwrap();
    }

    let mut socketio_xs = Vec::new();
    let mut plain_xs = Vec::new();
    for _ in 0..3 {
        let packet = next_text(&mut socketio, Duration::from_secs(2)).await.unwrap();
        socketio_xs.push(socketio_payload(&packet)[0]["x"].as_f64().unwrap());

        let frame = next_text(&mut plain, Duration::from_secs(2)).await.unwrap();
        let frame: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(frame["event"], "handPosition");
        plain_xs.push(frame["data"][0]["x"].as_f64().unwrap());
    }

    assert_eq!(socketio_xs, vec![10.0, 20.0, 30.0]);
    assert_eq!(plain_xs, socketio_xs);

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn frames_without_detections_are_not_sent() {
    let (engine, frames) = ChannelEngine::new();
    let running = start(RelayConfig::default(), engine).await;

    let mut client = socketio_subscriber(running.addr).await;
    wait_for_subscribers(&running.registry, 1).await;

    frames.send(no_hands()).unwrap();
    frames.send(json!({"other_model": {}})).unwrap();
    frames.send(two_hands()).unwrap();

    // The first event seen is the two-hand batch
    let packet = next_text(&mut client, Duration::from_secs(2)).await.unwrap();
    assert_eq!(socketio_payload(&packet), expected_records());
    assert!(next_text(&mut client, Duration::from_millis(200)).await.is_none());

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_subscriber_does_not_affect_others() {
    let (engine, frames) = ChannelEngine::new();
    let running = start(RelayConfig::default(), engine).await;

    let mut kept = socketio_subscriber(running.addr).await;
    let mut dropped = socketio_subscriber(running.addr).await;
    wait_for_subscribers(&running.registry, 2).await;

    dropped.close(None).await.unwrap();
    drop(dropped);
    frames.send(two_hands()).unwrap();

    let packet = next_text(&mut kept, Duration::from_secs(2)).await.unwrap();
    assert_eq!(socketio_payload(&packet), expected_records());
    wait_for_subscribers(&running.registry, 1).await;

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_is_bounded_when_engine_ignores_stop() {
    let (mut engine, _frames) = ChannelEngine::new();
    engine.ignore_stop = true;
    let config = RelayConfig::default().shutdown_timeout(Duration::from_millis(200));
    let running = start(config, engine).await;

    let mut client = socketio_subscriber(running.addr).await;
    wait_for_subscribers(&running.registry, 1).await;

    let started = std::time::Instant::now();
    running.stop.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(3), running.server)
        .await
        .expect("shutdown was not bounded");
    assert!(result.unwrap().is_ok());
    assert!(started.elapsed() < Duration::from_secs(3));

    // Subscribers are told the namespace is going away
    assert_eq!(
        next_text(&mut client, Duration::from_secs(1)).await.as_deref(),
        Some("41")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_keeps_serving_after_producer_exits() {
    let (engine, frames) = ChannelEngine::new();
    let running = start(RelayConfig::default(), engine).await;

    // Disconnecting the feed ends the engine thread
    drop(frames);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let _client = socketio_subscriber(running.addr).await;
    wait_for_subscribers(&running.registry, 1).await;

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}
