//! Normalized detection records
//!
//! A record is built from a corner-form box `(x_min, y_min, x_max, y_max)`
//! and is validated on construction, so every record in circulation has a
//! non-negative size and a confidence in `[0, 1]`.

use serde::Serialize;

use super::error::ExtractError;

/// One detected object in source-frame pixel space
///
/// Serializes as `{x, y, width, height, confidence, type}`. There is no
/// deserializer; records only come from [`DetectionRecord::from_corners`]:
///
/// ```compile_fail
/// let record: hand_relay::DetectionRecord = serde_json::from_str(
///     r#"{"x":0,"y":0,"width":-5,"height":-1,"confidence":7,"type":"hand"}"#,
/// )
/// .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    confidence: f64,
    #[serde(rename = "type")]
    class_name: String,
}

impl DetectionRecord {
    /// Build a record from the box corners of detection `index`
    pub fn from_corners(
        index: usize,
        corners: [f64; 4],
        confidence: f64,
        class_name: impl Into<String>,
    ) -> Result<Self, ExtractError> {
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(ExtractError::MalformedBox { index });
        }

        let [x_min, y_min, x_max, y_max] = corners;
        let width = x_max - x_min;
        let height = y_max - y_min;
        // Finite corners can still overflow when subtracted
        if !width.is_finite() || !height.is_finite() {
            return Err(ExtractError::MalformedBox { index });
        }
        if width < 0.0 || height < 0.0 {
            return Err(ExtractError::InvertedBox {
                index,
                width,
                height,
            });
        }

        if !(0.0..=1.0).contains(&confidence) {
            return Err(ExtractError::InvalidConfidence {
                index,
                value: confidence,
            });
        }

        Ok(Self {
            x: x_min,
            y: y_min,
            width,
            height,
            confidence,
            class_name: class_name.into(),
        })
    }

    /// Left edge
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Top edge
    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Detection confidence in `[0, 1]`
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Class label (serialized as `type`)
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

/// All records extracted from one processed frame, in detection order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionBatch(Vec<DetectionRecord>);

impl DetectionBatch {
    pub fn new(records: Vec<DetectionRecord>) -> Self {
        Self(records)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> &[DetectionRecord] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DetectionRecord> {
        self.0.iter()
    }

    pub fn into_records(self) -> Vec<DetectionRecord> {
        self.0
    }
}

impl From<Vec<DetectionRecord>> for DetectionBatch {
    fn from(records: Vec<DetectionRecord>) -> Self {
        Self(records)
    }
}

impl<'a> IntoIterator for &'a DetectionBatch {
    type Item = &'a DetectionRecord;
    type IntoIter = std::slice::Iter<'a, DetectionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_corners() {
        let record =
            DetectionRecord::from_corners(0, [10.0, 20.0, 50.0, 60.0], 0.9, "hand").unwrap();

        assert_eq!(record.x(), 10.0);
        assert_eq!(record.y(), 20.0);
        assert_eq!(record.width(), 40.0);
        assert_eq!(record.height(), 40.0);
        assert_eq!(record.confidence(), 0.9);
        assert_eq!(record.class_name(), "hand");
    }

    #[test]
    fn test_degenerate_box_allowed() {
        // Zero-area boxes are valid, only negative sizes are rejected
        let record = DetectionRecord::from_corners(0, [5.0, 5.0, 5.0, 5.0], 0.1, "hand").unwrap();
        assert_eq!(record.width(), 0.0);
        assert_eq!(record.height(), 0.0);
    }

    #[test]
    fn test_inverted_box_rejected() {
        let err =
            DetectionRecord::from_corners(3, [50.0, 20.0, 10.0, 60.0], 0.9, "hand").unwrap_err();
        assert!(matches!(err, ExtractError::InvertedBox { index: 3, .. }));
    }

    #[test]
    fn test_non_finite_box_rejected() {
        let err =
            DetectionRecord::from_corners(1, [f64::NAN, 0.0, 1.0, 1.0], 0.5, "hand").unwrap_err();
        assert_eq!(err, ExtractError::MalformedBox { index: 1 });
    }

    #[test]
    fn test_overflowing_size_rejected() {
        let err = DetectionRecord::from_corners(2, [-1.0e308, 0.0, 1.0e308, 1.0], 0.5, "hand")
            .unwrap_err();
        assert_eq!(err, ExtractError::MalformedBox { index: 2 });

        let err = DetectionRecord::from_corners(0, [0.0, -1.0e308, 1.0, 1.0e308], 0.5, "hand")
            .unwrap_err();
        assert_eq!(err, ExtractError::MalformedBox { index: 0 });
    }

    #[test]
    fn test_confidence_out_of_range() {
        let err = DetectionRecord::from_corners(0, [0.0, 0.0, 1.0, 1.0], 1.5, "hand").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfidence { index: 0, .. }));

        let err =
            DetectionRecord::from_corners(0, [0.0, 0.0, 1.0, 1.0], f64::NAN, "hand").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfidence { .. }));
    }

    #[test]
    fn test_wire_shape() {
        let record =
            DetectionRecord::from_corners(0, [100.0, 100.0, 120.0, 140.0], 0.5, "fist").unwrap();
        let batch = DetectionBatch::from(vec![record]);

        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(
            value,
            json!([{
                "x": 100.0,
                "y": 100.0,
                "width": 20.0,
                "height": 40.0,
                "confidence": 0.5,
                "type": "fist"
            }])
        );
    }
}
