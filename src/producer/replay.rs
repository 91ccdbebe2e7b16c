//! File replay engine
//!
//! Plays back raw engine results recorded as newline-delimited JSON, one
//! result per line, paced at the source's `max_fps`. Useful for running the
//! relay without a camera or model, and for demos against the frontend.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use super::engine::{
    EngineError, InferenceEngine, PredictionSink, RawFrameResult, StopToken, VideoFrame,
    VideoSourceProperties,
};

/// Pacing used when the source sets no `max_fps`
pub const DEFAULT_REPLAY_FPS: f64 = 30.0;

/// Longest single sleep, so a stop request is noticed promptly
const STOP_POLL: Duration = Duration::from_millis(50);

/// Replays recorded raw results from an NDJSON file
pub struct ReplayEngine {
    path: PathBuf,
    properties: VideoSourceProperties,
    looping: bool,
    worker: Option<JoinHandle<u64>>,
}

impl ReplayEngine {
    pub fn new(path: impl Into<PathBuf>, properties: VideoSourceProperties) -> Self {
        Self {
            path: path.into(),
            properties,
            looping: false,
            worker: None,
        }
    }

    /// Restart from the first line after the last one
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delay between frames
    ///
    /// Fails when `max_fps` is so small the delay is not representable.
    pub fn frame_interval(&self) -> Result<Duration, EngineError> {
        let fps = self
            .properties
            .max_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(DEFAULT_REPLAY_FPS);
        Duration::try_from_secs_f64(1.0 / fps)
            .map_err(|e| EngineError::Failed(format!("max fps {fps} out of range: {e}")))
    }

    fn load(&self) -> Result<Vec<RawFrameResult>, EngineError> {
        let contents = std::fs::read_to_string(&self.path)?;
        let mut frames = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(raw) => frames.push(raw),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed replay line"
                ),
            }
        }

        if frames.is_empty() {
            return Err(EngineError::Failed(format!(
                "{} contains no frames",
                self.path.display()
            )));
        }
        Ok(frames)
    }
}

impl InferenceEngine for ReplayEngine {
    fn start(&mut self, sink: PredictionSink, stop: StopToken) -> Result<(), EngineError> {
        if self.worker.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        let interval = self.frame_interval()?;
        let frames = self.load()?;
        tracing::info!(
            path = %self.path.display(),
            frames = frames.len(),
            looping = self.looping,
            interval_ms = interval.as_millis() as u64,
            "Replay loaded"
        );

        let player = Player {
            frames,
            interval,
            looping: self.looping,
            properties: self.properties,
        };
        let worker = thread::Builder::new()
            .name("replay-engine".into())
            .spawn(move || player.run(sink, stop))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn join(&mut self) -> Result<(), EngineError> {
        let worker = self.worker.take().ok_or(EngineError::NotStarted)?;
        let frames = worker.join().map_err(|_| EngineError::Panicked)?;
        tracing::info!(frames = frames, "Replay finished");
        Ok(())
    }
}

struct Player {
    frames: Vec<RawFrameResult>,
    interval: Duration,
    looping: bool,
    properties: VideoSourceProperties,
}

impl Player {
    /// Returns the number of frames played
    fn run(self, mut sink: PredictionSink, stop: StopToken) -> u64 {
        let mut frame_id = 0u64;
        let mut next_due = Instant::now();

        'replay: loop {
            for raw in &self.frames {
                if stop.is_stopped() {
                    break 'replay;
                }

                frame_id += 1;
                let frame = VideoFrame {
                    frame_id,
                    frame_timestamp: SystemTime::now(),
                    width: self.properties.frame_width,
                    height: self.properties.frame_height,
                };
                sink(raw, &frame);

                next_due += self.interval;
                let now = Instant::now();
                if next_due > now {
                    sleep_until(next_due, &stop);
                } else {
                    // Fell behind; don't try to catch up with a burst
                    next_due = now;
                }
            }

            if !self.looping {
                break;
            }
        }

        frame_id
    }
}

fn sleep_until(deadline: Instant, stop: &StopToken) {
    loop {
        let now = Instant::now();
        if now >= deadline || stop.is_stopped() {
            return;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}
