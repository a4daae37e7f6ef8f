//! Wrap → compress → publish behind the breaker → dead-letter on failure.

use crate::compression::EnvelopeCodec;
use crate::error::TransportError;
use crate::metrics;
use crate::publisher::{EventBridgePublisher, EventBusClient};
use chrono::Utc;
use dead_letter::DeadLetterSink;
use event_schema::{BaseEvent, CrossRegionEnvelope, DeadLetterRecord};
use resilience::CircuitBreaker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const ROUTING_FAILURE: &str = "routing_failure";

/// Result of one propagation attempt; the pipeline itself never fails
#[derive(Debug, Clone, PartialEq)]
pub enum PropagationOutcome {
    Delivered { latency: Duration },
    DeadLettered { error: String },
    /// Publish failed and the dead-letter hand-off failed too
    DeadLetterFailed { error: String, dead_letter_error: String },
}

impl PropagationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationOutcome::Delivered { .. } => "delivered",
            PropagationOutcome::DeadLettered { .. } => "dead_lettered",
            PropagationOutcome::DeadLetterFailed { .. } => "dead_letter_failed",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, PropagationOutcome::Delivered { .. })
    }
}

pub struct PropagationPipeline<C: ?Sized> {
    publisher: EventBridgePublisher<C>,
    breaker: Arc<CircuitBreaker>,
    codec: EnvelopeCodec,
    dead_letter: Arc<dyn DeadLetterSink>,
    handler_name: String,
    source_region: String,
}

impl<C: EventBusClient + ?Sized> PropagationPipeline<C> {
    pub fn new(
        publisher: EventBridgePublisher<C>,
        breaker: Arc<CircuitBreaker>,
        dead_letter: Arc<dyn DeadLetterSink>,
        source_region: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            breaker,
            codec: EnvelopeCodec::default(),
            dead_letter,
            handler_name: "event-router".to_string(),
            source_region: source_region.into(),
        }
    }

    pub fn with_codec(mut self, codec: EnvelopeCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Name stamped as `source_handler` on dead-letter records
    pub fn with_handler_name(mut self, name: impl Into<String>) -> Self {
        self.handler_name = name.into();
        self
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn source_region(&self) -> &str {
        &self.source_region
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn propagate(&self, event: BaseEvent, target_region: &str) -> PropagationOutcome {
        let envelope = self
            .codec
            .seal(CrossRegionEnvelope::wrap(event.clone(), target_region));
        let original_timestamp = envelope.original_timestamp;

        let published = self
            .breaker
            .call(|| self.publisher.publish_cross_region(&envelope))
            .await
            .map_err(TransportError::from);

        let outcome = match published {
            Ok(()) => {
                let latency = (Utc::now() - original_timestamp)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                metrics::record_latency(&self.source_region, target_region, latency);
                debug!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    target_region,
                    compression = %envelope.compression_type,
                    latency_ms = latency.as_millis() as u64,
                    "Routed event"
                );
                PropagationOutcome::Delivered { latency }
            }
            Err(e) => {
                warn!(
                    event_id = %event.event_id,
                    target_region,
                    breaker_state = %self.breaker.state(),
                    error = %e,
                    "Failed to route event, sending to dead-letter sink"
                );
                self.dead_letter(&event, e).await
            }
        };

        metrics::record_propagation(&self.source_region, target_region, outcome.as_str());
        outcome
    }

    /// One hand-off attempt, never retried
    async fn dead_letter(&self, event: &BaseEvent, err: TransportError) -> PropagationOutcome {
        let error = err.to_string();
        let original = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(event_id = %event.event_id, error = %e, "Failed to serialize event for dead-letter");
                return PropagationOutcome::DeadLetterFailed {
                    error,
                    dead_letter_error: e.to_string(),
                };
            }
        };

        let record =
            DeadLetterRecord::new(&original, ROUTING_FAILURE, error.clone(), &self.handler_name);
        match self.dead_letter.send(&record).await {
            Ok(()) => PropagationOutcome::DeadLettered { error },
            Err(e) => {
                error!(event_id = %event.event_id, error = %e, "Failed to send to dead-letter sink");
                PropagationOutcome::DeadLetterFailed {
                    error,
                    dead_letter_error: e.to_string(),
                }
            }
        }
    }
}
