//! Extraction error types

use thiserror::Error;

/// Why a raw frame result could not be turned into a batch
///
/// Any of these aborts extraction for the whole frame; no partial batch is
/// emitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// An index-aligned collection is missing while boxes are present
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field that must be a collection is something else
    #[error("{0} is not an array")]
    NotAnArray(&'static str),

    /// Index-aligned collections disagree on the detection count
    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A bounding box is not four finite numbers
    #[error("bounding box {index} is malformed")]
    MalformedBox { index: usize },

    /// A bounding box has max < min on some axis
    #[error("bounding box {index} is inverted ({width} x {height})")]
    InvertedBox {
        index: usize,
        width: f64,
        height: f64,
    },

    /// A confidence is not a finite number in [0, 1]
    #[error("confidence {index} is not a probability: {value}")]
    InvalidConfidence { index: usize, value: f64 },

    /// A per-index value has the wrong JSON type
    #[error("{field}[{index}] has the wrong type")]
    WrongType { field: &'static str, index: usize },
}
