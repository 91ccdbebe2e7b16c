//! hand-relay server
//!
//! Replays recorded detection results and relays them to subscribers.
//!
//! Run with: cargo run --bin hand-relay -- --replay frames.ndjson
//!
//! Every flag can also be set through the environment variable shown in
//! `--help`. Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hand_relay::broadcast::DrainMode;
use hand_relay::producer::{ReplayEngine, VideoSourceProperties};
use hand_relay::{OverflowPolicy, RelayConfig, RelayServer};

#[derive(Debug, Parser)]
#[command(name = "hand-relay", version, about = "Relay hand detections to WebSocket subscribers")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0:6789")]
    bind: SocketAddr,

    /// Broadcast tick period in milliseconds
    #[arg(long, env = "RELAY_POLL_INTERVAL_MS", default_value_t = 20)]
    poll_interval_ms: u64,

    /// Pending batches kept between producer and broadcaster
    #[arg(long, env = "RELAY_QUEUE_CAPACITY", default_value_t = 64)]
    queue_capacity: usize,

    /// unbounded, drop-oldest or drop-newest
    #[arg(long, env = "RELAY_OVERFLOW", default_value = "drop-oldest")]
    overflow: OverflowPolicy,

    /// Batches per tick: one or all
    #[arg(long, env = "RELAY_DRAIN", default_value = "one")]
    drain: DrainMode,

    /// Workflow output holding the predictions
    #[arg(long, env = "RELAY_MODEL_KEY", default_value = "model_all")]
    model_key: String,

    /// Drop detections below this confidence
    #[arg(long, env = "RELAY_MIN_CONFIDENCE", default_value_t = 0.0)]
    min_confidence: f64,

    /// Comma-separated allowed origins, `*` for any
    #[arg(long, env = "RELAY_CORS_ORIGINS", default_value = "*", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Maximum concurrent subscribers (0 = unlimited)
    #[arg(long, env = "RELAY_MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,

    /// Newline-delimited JSON file of raw engine results
    #[arg(long, env = "RELAY_REPLAY_FILE")]
    replay: PathBuf,

    /// Restart the replay when it reaches the end
    #[arg(long = "loop", env = "RELAY_REPLAY_LOOP")]
    looping: bool,

    #[arg(long, env = "FRAME_WIDTH", default_value_t = 1920)]
    frame_width: u32,

    #[arg(long, env = "FRAME_HEIGHT", default_value_t = 1080)]
    frame_height: u32,

    /// Frames per second to replay at (default 30)
    #[arg(long, env = "MAX_FPS")]
    max_fps: Option<f64>,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        let mut config = RelayConfig::with_addr(self.bind)
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .queue(self.queue_capacity, self.overflow)
            .drain_mode(self.drain)
            .model_key(self.model_key.clone())
            .min_confidence(self.min_confidence)
            .max_connections(self.max_connections);
        if !self.cors_origins.is_empty() {
            config = config.cors_allowed_origins(self.cors_origins.iter().map(|o| o.trim()));
        }
        config
    }

    fn engine(&self) -> ReplayEngine {
        let properties = VideoSourceProperties {
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            max_fps: self.max_fps,
        };
        ReplayEngine::new(&self.replay, properties).looping(self.looping)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let server = match RelayServer::bind(args.relay_config()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start relay");
            return ExitCode::FAILURE;
        }
    };

    match server.run(args.engine()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Relay failed");
            ExitCode::FAILURE
        }
    }
}
