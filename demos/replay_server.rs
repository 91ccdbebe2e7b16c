//! Replay the bundled sample recording in a loop
//!
//! Run with: cargo run --example replay_server [BIND_ADDR]
//!
//! Then connect any Socket.IO v4 client:
//!
//! ```js
//! const socket = io("http://localhost:6789", { transports: ["websocket"] });
//! socket.on("handPosition", (hands) => console.log(hands));
//! ```
//!
//! or a plain WebSocket client to `ws://localhost:6789/` for
//! `{"event":"handPosition","data":[...]}` frames.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use hand_relay::producer::{ReplayEngine, VideoSourceProperties};
use hand_relay::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hand_relay=debug".parse()?)
                .add_directive("replay_server=debug".parse()?),
        )
        .init();

    let bind_addr: SocketAddr = match std::env::args().nth(1) {
        Some(addr) => addr.parse()?,
        None => SocketAddr::from(([127, 0, 0, 1], 6789)),
    };

    let recording = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/hands.ndjson");
    let engine = ReplayEngine::new(
        recording,
        VideoSourceProperties {
            max_fps: Some(30.0),
            ..VideoSourceProperties::default()
        },
    )
    .looping(true);

    let config = RelayConfig::with_addr(bind_addr).stats_interval(Duration::from_secs(10));
    let server = RelayServer::bind(config).await?;

    let addr = server.local_addr()?;
    println!("Relaying sample hands on {addr}");
    println!("Socket.IO: http://{addr}  (transports: [\"websocket\"])");
    println!("WebSocket: ws://{addr}/");
    println!("Press Ctrl-C to stop");

    server.run(engine).await?;
    Ok(())
}
