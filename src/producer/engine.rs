//! Inference engine contract

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

/// One raw per-frame result as produced by the engine
pub type RawFrameResult = serde_json::Value;

/// Per-frame callback installed by the relay
///
/// Called synchronously on the engine's own thread; must return quickly.
pub type PredictionSink = Box<dyn FnMut(&RawFrameResult, &VideoFrame) + Send + 'static>;

/// Metadata of the frame a result belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Monotonic frame counter, starting at 1
    pub frame_id: u64,
    /// Capture time
    pub frame_timestamp: SystemTime,
    pub width: u32,
    pub height: u32,
}

/// Properties requested from the video source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSourceProperties {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Upper bound on processed frames per second
    pub max_fps: Option<f64>,
}

impl Default for VideoSourceProperties {
    fn default() -> Self {
        Self {
            frame_width: 1920,
            frame_height: 1080,
            max_fps: None,
        }
    }
}

/// Cooperative stop request shared with the engine
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the engine to stop after the current frame
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Engine failure
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine not started")]
    NotStarted,

    #[error("engine thread panicked")]
    Panicked,

    #[error("{0}")]
    Failed(String),
}

/// An external frame-processing engine
///
/// The relay drives it from a dedicated thread: `start` once, then `join`
/// until processing ends. `start` must not block; it begins invoking `sink`
/// once per processed frame on an engine-owned execution context. The engine
/// should check `stop` between frames and wind down when it is set.
pub trait InferenceEngine: Send + 'static {
    /// Begin processing
    fn start(&mut self, sink: PredictionSink, stop: StopToken) -> Result<(), EngineError>;

    /// Block until processing stops
    fn join(&mut self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_token_shared() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!clone.is_stopped());

        token.stop();
        assert!(clone.is_stopped());
    }

    #[test]
    fn test_default_source_properties() {
        let props = VideoSourceProperties::default();
        assert_eq!(props.frame_width, 1920);
        assert_eq!(props.frame_height, 1080);
        assert_eq!(props.max_fps, None);
    }
}
