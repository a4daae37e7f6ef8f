use crate::RowImage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version stamped on every base event
pub const EVENT_VERSION: &str = "1.0";

/// Domain event published on the event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseEvent {
    /// Unique event ID for idempotency and tracing
    pub event_id: String,
    pub event_type: String,
    pub source_region: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
    #[serde(default)]
    pub payload: RowImage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMetadata {
    pub source_service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub trace_id: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl BaseEvent {
    pub fn new(
        event_type: impl Into<String>,
        source_region: impl Into<String>,
        payload: RowImage,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            source_region: source_region.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            metadata: EventMetadata {
                version: EVENT_VERSION.to_string(),
                ..Default::default()
            },
            payload,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.metadata.trace_id = trace_id.into();
        self
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_base_event_defaults() {
        let event = BaseEvent::new("customer.created", "us-east-1", RowImage::new());

        assert!(!event.event_id.is_empty());
        assert_eq!(event.metadata.version, EVENT_VERSION);
        assert!(event.correlation_id.is_none());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let event = BaseEvent::new("customer.created", "us-east-1", RowImage::new());
        let value = serde_json::to_value(&event).unwrap();

        assert!(value.get("correlation_id").is_none());
        assert!(value["metadata"].get("priority").is_none());
        assert_eq!(value["metadata"]["version"], json!("1.0"));
    }

    #[test]
    fn test_decode_external_event() {
        let raw = json!({
            "event_id": "evt-1",
            "event_type": "order.placed",
            "source_region": "us-west-2",
            "timestamp": "2024-03-01T12:00:00.250Z",
            "metadata": {"source_service": "orders", "trace_id": "t-1", "version": "1.0", "priority": 2},
            "payload": {"order_id": 9, "total": 12.5}
        });
        let event = BaseEvent::from_json(&serde_json::to_vec(&raw).unwrap()).unwrap();

        assert_eq!(event.metadata.priority, Some(2));
        assert_eq!(event.payload["total"], json!(12.5));
    }
}
