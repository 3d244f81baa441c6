//! Event model shared by the relay, the store and every subscriber.
//!
//! Producers submit an [`Event`] (a type tag plus a JSON payload). The store
//! stamps it with a global [`Sequence`] and from then on it travels as an
//! immutable [`SequencedEvent`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Global position of an event in the log.
///
/// Sequences start at 1. A watermark of 0 means nothing has been folded yet.
pub type Sequence = u64;

/// Watermark value before any event has been applied.
pub const NO_SEQUENCE: Sequence = 0;

/// An event as submitted by a producer: a type tag and a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind. The set of kinds is open-ended.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Payload, schema determined by `event_type`.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    /// Create an event from a type tag and payload map.
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// Create an event from any serializable payload.
    ///
    /// The payload must serialize to a JSON object.
    pub fn from_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let data = match serde_json::to_value(payload)? {
            Value::Object(map) => map,
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "event payload must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
        Ok(Self::new(event_type, data))
    }

    /// Decode the payload into a typed structure.
    pub fn payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.data.clone()))
    }
}

/// An event after it has been appended to the log.
///
/// Wire shape: `{"type": ..., "data": {...}, "sequence": n}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub sequence: Sequence,
}

impl SequencedEvent {
    pub fn new(sequence: Sequence, event: Event) -> Self {
        Self { event, sequence }
    }

    /// Event type tag.
    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
