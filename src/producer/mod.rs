//! Frame producer integration
//!
//! This module provides:
//! - `InferenceEngine`: the contract of the external frame-processing engine
//! - `prediction_sink`: the per-frame callback (extract, then hand off)
//! - `ProducerHandle`: the dedicated thread that drives an engine
//! - `ReplayEngine`: replays recorded raw results from a file

pub mod engine;
pub mod replay;
pub mod sink;
pub mod thread;

pub use engine::{
    EngineError, InferenceEngine, PredictionSink, RawFrameResult, StopToken, VideoFrame,
    VideoSourceProperties,
};
pub use replay::ReplayEngine;
pub use sink::prediction_sink;
pub use thread::ProducerHandle;
