/// Configuration for the event router, loaded from environment variables
use event_consumer::{env_parse, KafkaConsumerConfig, LoopSettings};
use resilience::CircuitBreakerConfig;
use std::env;
use std::time::Duration;

pub const DEFAULT_SOURCE_TOPIC: &str = "replication.source-changes";
pub const DEFAULT_GROUP_ID: &str = "event-router";

#[derive(Debug, Clone)]
pub struct Config {
    pub kafka: KafkaConsumerConfig,
    /// Region this instance runs in
    pub source_region: String,
    /// Region whose event bus receives the routed events
    pub partner_region: String,
    pub event_bus_name: String,
    /// SQS queue for events that could not be routed
    pub dlq_url: Option<String>,
    /// Kafka topic for events that could not be routed, used when no queue is set
    pub dlq_topic: Option<String>,
    pub circuit_max_failures: u32,
    pub circuit_open_timeout: Duration,
    pub zstd_level: i32,
    pub max_delivery_attempts: Option<u32>,
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka: KafkaConsumerConfig {
                group_id: DEFAULT_GROUP_ID.to_string(),
                topics: vec![DEFAULT_SOURCE_TOPIC.to_string()],
                ..KafkaConsumerConfig::default()
            },
            source_region: "us-east-1".to_string(),
            partner_region: "us-west-2".to_string(),
            event_bus_name: "default".to_string(),
            dlq_url: None,
            dlq_topic: None,
            circuit_max_failures: 5,
            circuit_open_timeout: Duration::from_secs(30),
            zstd_level: 3,
            max_delivery_attempts: Some(5),
            metrics_port: 9091,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut kafka = KafkaConsumerConfig::from_env();
        if env::var("KAFKA_TOPICS").is_err() {
            kafka.topics = defaults.kafka.topics.clone();
        }
        if env::var("KAFKA_GROUP_ID").is_err() {
            kafka.group_id = defaults.kafka.group_id.clone();
        }

        let max_delivery_attempts = match env_parse(
            "ROUTER_MAX_DELIVERY_ATTEMPTS",
            defaults.max_delivery_attempts.unwrap_or(0),
        ) {
            0 => None,
            n => Some(n),
        };

        Self {
            kafka,
            source_region: non_empty("AWS_REGION").unwrap_or(defaults.source_region),
            partner_region: non_empty("PARTNER_REGION").unwrap_or(defaults.partner_region),
            event_bus_name: non_empty("EVENT_BUS_NAME").unwrap_or(defaults.event_bus_name),
            dlq_url: non_empty("DLQ_URL"),
            dlq_topic: non_empty("DLQ_TOPIC"),
            circuit_max_failures: env_parse("CIRCUIT_MAX_FAILURES", defaults.circuit_max_failures),
            circuit_open_timeout: Duration::from_secs(env_parse(
                "CIRCUIT_OPEN_TIMEOUT_SECS",
                defaults.circuit_open_timeout.as_secs(),
            )),
            zstd_level: env_parse("ZSTD_LEVEL", defaults.zstd_level),
            max_delivery_attempts,
            metrics_port: env_parse("METRICS_PORT", defaults.metrics_port),
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_max_failures,
            timeout: self.circuit_open_timeout,
            ..CircuitBreakerConfig::default()
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
