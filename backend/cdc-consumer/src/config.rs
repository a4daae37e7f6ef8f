/// Configuration for the CDC consumer, loaded from environment variables
use event_consumer::{env_parse, KafkaConsumerConfig, LoopSettings};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Broker connection and subscription
    pub kafka: KafkaConsumerConfig,
    /// Failed deliveries before dead-lettering; `None` retries forever
    pub max_delivery_attempts: Option<u32>,
    /// DynamoDB replica table; when unset changes are only logged
    pub replica_table_name: Option<String>,
    /// SQS dead-letter queue
    pub dlq_url: Option<String>,
    /// Kafka dead-letter topic, used when no SQS queue is set
    pub dlq_topic: Option<String>,
    /// Accept schema-registry framed payloads as well as plain JSON
    pub schema_registry_framing: bool,
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka: KafkaConsumerConfig::default(),
            max_delivery_attempts: Some(5),
            replica_table_name: None,
            dlq_url: None,
            dlq_topic: None,
            schema_registry_framing: false,
            metrics_port: 9090,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_delivery_attempts = match env_parse(
            "CDC_MAX_DELIVERY_ATTEMPTS",
            defaults.max_delivery_attempts.unwrap_or(0),
        ) {
            0 => None,
            n => Some(n),
        };

        Self {
            kafka: KafkaConsumerConfig::from_env(),
            max_delivery_attempts,
            replica_table_name: non_empty("REPLICA_TABLE_NAME"),
            dlq_url: non_empty("DLQ_URL"),
            dlq_topic: non_empty("DLQ_TOPIC"),
            schema_registry_framing: non_empty("SCHEMA_REGISTRY_URL").is_some()
                || env_parse("CDC_SCHEMA_REGISTRY_FRAMING", false),
            metrics_port: env_parse("METRICS_PORT", defaults.metrics_port),
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            consumer_group: self.kafka.group_id.clone(),
            poll_timeout: self.kafka.poll_timeout,
            max_delivery_attempts: self.max_delivery_attempts,
            ..LoopSettings::default()
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
