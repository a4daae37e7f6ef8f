use crate::{
    failure_timestamp, metrics, DeadLetterError, DeadLetterSink, Result, ERROR_MESSAGE_ATTRIBUTE,
    FAILURE_TIMESTAMP_ATTRIBUTE,
};
use async_trait::async_trait;
use event_schema::DeadLetterRecord;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct KafkaDeadLetterConfig {
    pub brokers: String,
    pub topic: String,
    /// Delivery timeout (ms)
    pub timeout_ms: u64,
}

impl Default for KafkaDeadLetterConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "cdc-dlq".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// Dead-letter topic on Kafka; attributes travel as headers
pub struct KafkaDeadLetterSink {
    config: KafkaDeadLetterConfig,
    producer: FutureProducer,
}

impl KafkaDeadLetterSink {
    pub fn new(config: KafkaDeadLetterConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.timeout_ms.to_string())
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .create()
            .map_err(|e| {
                DeadLetterError::Transport(format!("failed to create dead-letter producer: {e}"))
            })?;

        Ok(Self { config, producer })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }
}

#[async_trait]
impl DeadLetterSink for KafkaDeadLetterSink {
    async fn send(&self, record: &DeadLetterRecord) -> Result<()> {
        let payload = record.to_json()?;
        let timestamp = failure_timestamp(record);

        let headers = OwnedHeaders::new()
            .insert(Header {
                key: ERROR_MESSAGE_ATTRIBUTE,
                value: Some(record.error_message.as_bytes()),
            })
            .insert(Header {
                key: FAILURE_TIMESTAMP_ATTRIBUTE,
                value: Some(timestamp.as_bytes()),
            })
            .insert(Header {
                key: "error_type",
                value: Some(record.error_type.as_bytes()),
            });

        let kafka_record = FutureRecord::to(&self.config.topic)
            .key(&record.source_handler)
            .payload(&payload)
            .headers(headers);

        match self
            .producer
            .send(kafka_record, Duration::from_millis(self.config.timeout_ms))
            .await
        {
            Ok((partition, offset)) => {
                metrics::record_dead_lettered(&record.source_handler, &record.error_type);
                debug!(
                    topic = %self.config.topic,
                    partition = partition,
                    offset = offset,
                    error_type = %record.error_type,
                    "Dead-letter record written"
                );
                Ok(())
            }
            Err((e, _)) => {
                metrics::record_send_failure(&record.source_handler, "kafka");
                error!(error = %e, topic = %self.config.topic, "Failed to write dead-letter record");
                Err(DeadLetterError::Transport(format!("kafka send error: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KafkaDeadLetterConfig::default();
        assert_eq!(config.topic, "cdc-dlq");
        assert_eq!(config.timeout_ms, 5000);
    }

    #[tokio::test]
    async fn test_producer_creation_is_lazy() {
        // librdkafka does not connect until the first send
        let sink = KafkaDeadLetterSink::new(KafkaDeadLetterConfig::default()).unwrap();
        assert_eq!(sink.topic(), "cdc-dlq");
    }
}
