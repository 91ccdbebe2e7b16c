//! Broadcast event type

use std::sync::Arc;

use serde::Serialize;

/// A named event with a pre-serialized JSON payload
///
/// Cheap to clone: name and payload are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    name: Arc<str>,
    payload: Arc<str>,
}

impl BroadcastEvent {
    /// Serialize `payload` once for fan-out
    pub fn new<T: Serialize + ?Sized>(name: &str, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: Arc::from(name),
            payload: Arc::from(serde_json::to_string(payload)?),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON text of the payload
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_payload_serialized_once() {
        let event = BroadcastEvent::new("handPosition", &json!([{"x": 1.0}])).unwrap();
        let copy = event.clone();

        assert_eq!(copy.name(), "handPosition");
        assert_eq!(copy.payload(), r#"[{"x":1.0}]"#);
        assert!(Arc::ptr_eq(&event.payload, &copy.payload));
    }
}
