//! Raw engine result → detection batch
//!
//! The engine hands over a JSON-shaped mapping. The only structure relied on
//! is:
//!
//! ```text
//! {
//!   "<model_key>": {
//!     "predictions": {
//!       "xyxy":       [[x_min, y_min, x_max, y_max], ...],
//!       "confidence": [c0, c1, ...],
//!       "data":       { "class_name": ["hand", ...] }
//!     }
//!   }
//! }
//! ```
//!
//! A missing sub-result or an empty box list is `Extraction::Absent`, not an
//! error. Once boxes are present, the other collections must line up with
//! them index for index.

use serde_json::Value;

use super::error::ExtractError;
use super::record::{DetectionBatch, DetectionRecord};

/// Key of the model output inside the raw result
pub const DEFAULT_MODEL_KEY: &str = "model_all";

/// Outcome of a successful extraction
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// No detections in this frame
    Absent,
    /// At least one record
    Present(DetectionBatch),
}

impl Extraction {
    /// Consume into the batch, if any
    pub fn into_batch(self) -> Option<DetectionBatch> {
        match self {
            Extraction::Absent => None,
            Extraction::Present(batch) => Some(batch),
        }
    }
}

/// Stateless extractor, cheap to clone into the producer callback
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    model_key: String,
    min_confidence: f64,
}

impl ResultExtractor {
    /// Extractor reading `model_all` with no confidence filter
    pub fn new() -> Self {
        Self {
            model_key: DEFAULT_MODEL_KEY.to_string(),
            min_confidence: 0.0,
        }
    }

    /// Read predictions from a different model output key
    pub fn with_model_key(mut self, key: impl Into<String>) -> Self {
        self.model_key = key.into();
        self
    }

    /// Drop records whose confidence is below `threshold`
    pub fn min_confidence(mut self, threshold: f64) -> Self {
        self.min_confidence = threshold;
        self
    }

    pub fn model_key(&self) -> &str {
        &self.model_key
    }

    /// Extract the detections of one frame
    pub fn extract(&self, raw: &Value) -> Result<Extraction, ExtractError> {
        let Some(predictions) = raw
            .get(self.model_key.as_str())
            .and_then(|output| output.get("predictions"))
            .filter(|p| !p.is_null())
        else {
            return Ok(Extraction::Absent);
        };

        let boxes = match predictions.get("xyxy") {
            None | Some(Value::Null) => return Ok(Extraction::Absent),
            Some(value) => value.as_array().ok_or(ExtractError::NotAnArray("xyxy"))?,
        };

        let count = boxes.len();
        if count == 0 {
            return Ok(Extraction::Absent);
        }

        let confidences = aligned(predictions.get("confidence"), "confidence", count)?;
        let class_names = aligned(
            predictions.get("data").and_then(|d| d.get("class_name")),
            "class_name",
            count,
        )?;

        let mut records = Vec::with_capacity(count);
        for index in 0..count {
            let corners = read_corners(&boxes[index], index)?;
            let confidence = confidences[index]
                .as_f64()
                .ok_or(ExtractError::WrongType {
                    field: "confidence",
                    index,
                })?;
            let class_name = class_names[index]
                .as_str()
                .ok_or(ExtractError::WrongType {
                    field: "class_name",
                    index,
                })?;

            let record = DetectionRecord::from_corners(index, corners, confidence, class_name)?;
            if record.confidence() >= self.min_confidence {
                records.push(record);
            }
        }

        if records.is_empty() {
            Ok(Extraction::Absent)
        } else {
            Ok(Extraction::Present(DetectionBatch::new(records)))
        }
    }
}

impl Default for ResultExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch a collection that must be index-aligned with the boxes
fn aligned<'a>(
    value: Option<&'a Value>,
    field: &'static str,
    expected: usize,
) -> Result<&'a [Value], ExtractError> {
    let items = value
        .ok_or(ExtractError::MissingField(field))?
        .as_array()
        .ok_or(ExtractError::NotAnArray(field))?;

    if items.len() != expected {
        return Err(ExtractError::LengthMismatch {
            field,
            expected,
            actual: items.len(),
        });
    }

    Ok(items)
}

fn read_corners(value: &Value, index: usize) -> Result<[f64; 4], ExtractError> {
    let malformed = ExtractError::MalformedBox { index };
    let coords = value.as_array().ok_or_else(|| malformed.clone())?;
    if coords.len() != 4 {
        return Err(malformed);
    }

    let mut corners = [0.0; 4];
    for (slot, coord) in corners.iter_mut().zip(coords) {
        *slot = coord.as_f64().ok_or_else(|| malformed.clone())?;
    }
    Ok(corners)
}
