use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Envelope of an inbound event delivery (router-facing).
///
/// This is the shape the external publishing platform POSTs to the webhook:
/// the event type, the raw (still untyped) payload, and whatever metadata the
/// platform attaches. Unknown metadata fields are tolerated and dropped.
///
/// Notes:
/// - `flow_type` is optional; when present it must match the registered flow.
/// - `sequence` is an optional monotonic per-aggregate position. The platform
///   does not always send one, in which case projection falls back to
///   last-arrival-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<String>,

    pub event_type: String,

    pub payload: JsonValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_time: Option<DateTime<Utc>>,

    /// Monotonically increasing position in the aggregate stream, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            event_id: None,
            flow_type: None,
            event_type: event_type.into(),
            payload,
            valid_time: None,
            sequence: None,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_flow_type(mut self, flow_type: impl Into<String>) -> Self {
        self.flow_type = Some(flow_type.into());
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_platform_delivery_and_ignores_extra_metadata() {
        let raw = json!({
            "eventId": "e-1",
            "timeBucket": "20250101000000",
            "tenant": "acme",
            "dataCoreId": "dc",
            "flowType": "todo-items",
            "eventType": "todo-item.completed.v0",
            "metadata": {},
            "payload": { "id": "t-1" },
            "validTime": "2025-01-01T00:00:00Z"
        });

        let env: EventEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(env.event_id.as_deref(), Some("e-1"));
        assert_eq!(env.flow_type.as_deref(), Some("todo-items"));
        assert_eq!(env.event_type, "todo-item.completed.v0");
        assert_eq!(env.payload, json!({ "id": "t-1" }));
        assert!(env.valid_time.is_some());
        assert_eq!(env.sequence, None);
    }

    #[test]
    fn event_type_and_payload_are_required() {
        assert!(serde_json::from_value::<EventEnvelope>(json!({ "payload": {} })).is_err());
        assert!(serde_json::from_value::<EventEnvelope>(json!({ "eventType": "x" })).is_err());
    }
}
