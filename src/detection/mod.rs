//! Detection records and raw-result extraction
//!
//! This module provides:
//! - `DetectionRecord` / `DetectionBatch`: the normalized shape sent to subscribers
//! - `ResultExtractor`: turns one raw engine result into a batch

pub mod error;
pub mod extract;
pub mod record;

pub use error::ExtractError;
pub use extract::{Extraction, ResultExtractor, DEFAULT_MODEL_KEY};
pub use record::{DetectionBatch, DetectionRecord};
