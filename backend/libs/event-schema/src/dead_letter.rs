use crate::SchemaError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `original_event_encoding` for payloads that are not JSON
pub const PAYLOAD_ENCODING_BASE64: &str = "base64";

/// Terminal failure handed to a dead-letter sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// The failed payload. Embedded as JSON when it parses, otherwise a base64 string.
    pub original_event: Value,
    /// Set to `base64` when `original_event` holds encoded raw bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_event_encoding: Option<String>,
    pub error_message: String,
    pub error_type: String,
    pub failure_count: u32,
    pub first_failure: DateTime<Utc>,
    pub last_failure: DateTime<Utc>,
    pub source_handler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl DeadLetterRecord {
    /// Single-failure record stamped now
    pub fn new(
        original_event: &[u8],
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        source_handler: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let (event, encoding) = match serde_json::from_slice(original_event) {
            Ok(value) => (value, None),
            Err(_) => (
                Value::String(STANDARD.encode(original_event)),
                Some(PAYLOAD_ENCODING_BASE64.to_string()),
            ),
        };
        Self {
            original_event: event,
            original_event_encoding: encoding,
            error_message: error_message.into(),
            error_type: error_type.into(),
            failure_count: 1,
            first_failure: now,
            last_failure: now,
            source_handler: source_handler.into(),
            stack_trace: None,
        }
    }

    /// Carry a failure history accumulated across redeliveries
    pub fn with_failures(mut self, failure_count: u32, first_failure: DateTime<Utc>) -> Self {
        self.failure_count = failure_count;
        self.first_failure = first_failure;
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Payload bytes for replay: the exact input when base64-encoded,
    /// re-serialized JSON otherwise
    pub fn original_bytes(&self) -> Result<Vec<u8>, SchemaError> {
        match (&self.original_event_encoding, &self.original_event) {
            (Some(encoding), Value::String(encoded)) if encoding == PAYLOAD_ENCODING_BASE64 => {
                Ok(STANDARD.decode(encoded)?)
            }
            (_, value) => Ok(serde_json::to_vec(value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_payload_is_embedded() {
        let record = DeadLetterRecord::new(br#"{"event_id":"e1"}"#, "routing_failure", "timeout", "event-router");

        assert_eq!(record.original_event, json!({"event_id": "e1"}));
        assert_eq!(record.failure_count, 1);
        assert_eq!(record.first_failure, record.last_failure);
    }

    #[test]
    fn test_framed_payload_survives_the_queue_byte_for_byte() {
        let framed = [0u8, 0, 0, 0, 0xC8, b'{', b'x', 0xFF];
        let record = DeadLetterRecord::new(&framed, "parse_error", "bad bytes", "cdc-consumer");
        assert_eq!(record.original_event_encoding.as_deref(), Some(PAYLOAD_ENCODING_BASE64));

        let wire = record.to_json().unwrap();
        let received: DeadLetterRecord = serde_json::from_str(&wire).unwrap();
        assert_eq!(received.original_bytes().unwrap(), framed.to_vec());
    }

    #[test]
    fn test_json_payload_has_no_encoding_marker() {
        let record = DeadLetterRecord::new(br#"{"n":1}"#, "handler_error", "boom", "cdc-consumer");
        assert!(record.original_event_encoding.is_none());
        assert!(!record.to_json().unwrap().contains("original_event_encoding"));
        assert_eq!(record.original_bytes().unwrap(), br#"{"n":1}"#.to_vec());
    }

    #[test]
    fn test_corrupt_base64_is_reported() {
        let mut record = DeadLetterRecord::new(&[0xff], "parse_error", "bad bytes", "cdc-consumer");
        record.original_event = Value::String("not base64!".into());
        assert!(matches!(record.original_bytes(), Err(SchemaError::PayloadEncoding(_))));
    }

    #[test]
    fn test_failure_history() {
        let first = Utc::now() - chrono::Duration::seconds(30);
        let record = DeadLetterRecord::new(b"{}", "handler_error", "boom", "cdc-consumer")
            .with_failures(5, first)
            .with_stack_trace("handler_error: boom");

        let value: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["failure_count"], json!(5));
        assert_eq!(value["source_handler"], json!("cdc-consumer"));
        assert_eq!(value["stack_trace"], json!("handler_error: boom"));
    }
}
