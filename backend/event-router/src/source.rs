//! Source-region change stream → propagation pipeline.

use crate::pipeline::{PropagationOutcome, PropagationPipeline};
use crate::publisher::EventBusClient;
use async_trait::async_trait;
use event_consumer::{InboundMessage, MessageProcessor, ProcessingError};
use event_schema::{BaseEvent, ChangeEvent};
use serde_json::Value;
use tracing::debug;

/// Decode a source-region record: a base event as-is, or a change record
/// republished as a `cdc.<OPERATION>` base event
pub fn decode_source_event(payload: &[u8], source_region: &str) -> Result<BaseEvent, String> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| format!("payload is not JSON: {e}"))?;

    let is_change_record = value.get("operation").is_some() && value.get("table_name").is_some();
    if is_change_record {
        let change = ChangeEvent::from_json(payload).map_err(|e| e.to_string())?;
        return Ok(change.to_base_event(source_region));
    }

    serde_json::from_value(value).map_err(|e| format!("invalid base event: {e}"))
}

/// Routes every consumed record to `target_region`.
///
/// Delivered and dead-lettered records are acknowledged. A record whose
/// dead-letter hand-off also failed is reported as a handler error so the
/// consumer redelivers it.
pub struct RouterProcessor<C: ?Sized> {
    pipeline: PropagationPipeline<C>,
    target_region: String,
}

impl<C: EventBusClient + ?Sized> RouterProcessor<C> {
    pub fn new(pipeline: PropagationPipeline<C>, target_region: impl Into<String>) -> Self {
        Self {
            pipeline,
            target_region: target_region.into(),
        }
    }

    pub fn pipeline(&self) -> &PropagationPipeline<C> {
        &self.pipeline
    }
}

#[async_trait]
impl<C: EventBusClient + ?Sized> MessageProcessor for RouterProcessor<C> {
    async fn process(&self, message: &InboundMessage) -> Result<(), ProcessingError> {
        let event = decode_source_event(&message.payload, self.pipeline.source_region())
            .map_err(ProcessingError::Parse)?;

        debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            offset = message.offset,
            "Routing source event"
        );

        match self.pipeline.propagate(event, &self.target_region).await {
            PropagationOutcome::Delivered { .. } | PropagationOutcome::DeadLettered { .. } => Ok(()),
            PropagationOutcome::DeadLetterFailed {
                error,
                dead_letter_error,
            } => Err(ProcessingError::Unavailable(format!(
                "{error}; dead-letter hand-off failed: {dead_letter_error}"
            ))),
        }
    }

    fn name(&self) -> &str {
        self.pipeline.handler_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_record_becomes_cdc_event() {
        let payload = serde_json::to_vec(&json!({
            "operation": "UPDATE",
            "table_name": "customers",
            "schema": "dbo",
            "timestamp": "2024-03-01T12:00:00Z",
            "transaction_id": "tx-7",
            "before": {"id": 1, "name": "a"},
            "after": {"id": 1, "name": "b"},
            "primary_keys": {"id": 1},
            "metadata": {"source_database": "crm"}
        }))
        .unwrap();

        let event = decode_source_event(&payload, "us-east-1").unwrap();
        assert_eq!(event.event_type, "cdc.UPDATE");
        assert_eq!(event.source_region, "us-east-1");
        assert_eq!(event.correlation_id.as_deref(), Some("tx-7"));
        assert_eq!(event.payload["after"]["name"], json!("b"));
    }

    #[test]
    fn test_base_event_passes_through() {
        let original = BaseEvent::new(
            "user.created",
            "us-east-1",
            json!({"user_id": "u1"}).as_object().cloned().unwrap(),
        );
        let event = decode_source_event(&original.to_json().unwrap(), "eu-west-1").unwrap();
        assert_eq!(event, original);
    }

    #[test]
    fn test_invalid_change_record_is_rejected() {
        let payload = serde_json::to_vec(&json!({
            "operation": "DELETE",
            "table_name": "customers",
            "timestamp": "2024-03-01T12:00:00Z",
            "primary_keys": {"id": 1}
        }))
        .unwrap();

        let err = decode_source_event(&payload, "us-east-1").unwrap_err();
        assert!(err.contains("before"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode_source_event(b"not json", "us-east-1").is_err());
        assert!(decode_source_event(b"{\"hello\":1}", "us-east-1").is_err());
    }
}
