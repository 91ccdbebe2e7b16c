//! Per-frame callback: extract, then hand off

use std::sync::Arc;

use super::engine::{PredictionSink, RawFrameResult, VideoFrame};
use crate::detection::{Extraction, ResultExtractor};
use crate::handoff::{HandoffChannel, PushOutcome};
use crate::stats::RelayStats;

/// Build the callback installed into the engine
///
/// Runs on the producer thread. Extraction errors are logged and the frame is
/// skipped; nothing here ever waits on the broadcaster.
pub fn prediction_sink(
    extractor: ResultExtractor,
    channel: Arc<HandoffChannel>,
    stats: Arc<RelayStats>,
) -> PredictionSink {
    Box::new(move |raw: &RawFrameResult, frame: &VideoFrame| {
        stats.record_frame();
        tracing::trace!(frame_id = frame.frame_id, raw = %raw, "Raw prediction");

        let batch = match extractor.extract(raw) {
            Ok(Extraction::Present(batch)) => batch,
            Ok(Extraction::Absent) => return,
            Err(e) => {
                stats.record_extract_failure();
                tracing::warn!(
                    frame_id = frame.frame_id,
                    error = %e,
                    "Dropping frame with malformed detections"
                );
                return;
            }
        };

        let records = batch.len();
        match channel.push(batch) {
            PushOutcome::Enqueued | PushOutcome::Ignored => {}
            PushOutcome::EvictedOldest => tracing::debug!(
                frame_id = frame.frame_id,
                records = records,
                "Handoff full, evicted oldest batch"
            ),
            PushOutcome::DroppedNewest => tracing::debug!(
                frame_id = frame.frame_id,
                records = records,
                "Handoff full, dropped batch"
            ),
        }
    })
}
