//! Dead-letter sinks
//!
//! Terminal failures are wrapped in a [`DeadLetterRecord`] and handed to a sink.
//! Every sink carries the same two string attributes next to the JSON body:
//! `ErrorMessage` and `FailureTimestamp` (RFC3339).
//!
//! - [`SqsDeadLetterSink`]: SQS queue (default for the router)
//! - [`KafkaDeadLetterSink`]: Kafka topic, attributes as headers
//! - [`InMemoryDeadLetterSink`]: local runs and tests

use async_trait::async_trait;
use chrono::SecondsFormat;
use event_schema::DeadLetterRecord;

pub mod kafka;
pub mod memory;
pub mod metrics;
pub mod sqs;

pub use kafka::{KafkaDeadLetterConfig, KafkaDeadLetterSink};
pub use memory::InMemoryDeadLetterSink;
pub use sqs::SqsDeadLetterSink;

pub const ERROR_MESSAGE_ATTRIBUTE: &str = "ErrorMessage";
pub const FAILURE_TIMESTAMP_ATTRIBUTE: &str = "FailureTimestamp";

#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
    #[error("failed to serialize dead-letter record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("dead-letter transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, DeadLetterError>;

/// Destination for records that could not be delivered or processed
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, record: &DeadLetterRecord) -> Result<()>;
}

/// `FailureTimestamp` attribute value
pub fn failure_timestamp(record: &DeadLetterRecord) -> String {
    record.last_failure.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_failure_timestamp_is_rfc3339_seconds() {
        let mut record = DeadLetterRecord::new(b"{}", "routing_failure", "timeout", "event-router");
        record.last_failure = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        assert_eq!(failure_timestamp(&record), "2024-03-01T12:30:00Z");
    }
}
