use rdkafka::ClientConfig;
use std::env;
use std::time::Duration;
use tracing::warn;

/// Kafka consumer configuration
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    /// Kafka brokers (comma-separated)
    pub brokers: String,
    pub group_id: String,
    pub topics: Vec<String>,
    /// PLAINTEXT, SSL, SASL_PLAINTEXT or SASL_SSL
    pub security_protocol: String,
    pub sasl_mechanism: String,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub auto_offset_reset: String,
    pub session_timeout_ms: u32,
    pub max_poll_interval_ms: u32,
    pub poll_timeout: Duration,
}

impl Default for KafkaConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "cdc-consumers".to_string(),
            topics: vec!["qlik.customers".to_string(), "qlik.orders".to_string()],
            security_protocol: "PLAINTEXT".to_string(),
            sasl_mechanism: "PLAIN".to_string(),
            sasl_username: None,
            sasl_password: None,
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: 30_000,
            max_poll_interval_ms: 300_000,
            poll_timeout: Duration::from_secs(1),
        }
    }
}

impl KafkaConsumerConfig {
    /// Read `KAFKA_*` variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            brokers: env::var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or(defaults.brokers),
            group_id: env::var("KAFKA_GROUP_ID").unwrap_or(defaults.group_id),
            topics: env::var("KAFKA_TOPICS")
                .ok()
                .map(|raw| parse_topics(&raw))
                .filter(|topics| !topics.is_empty())
                .unwrap_or(defaults.topics),
            security_protocol: env::var("KAFKA_SECURITY_PROTOCOL")
                .unwrap_or(defaults.security_protocol),
            sasl_mechanism: env::var("KAFKA_SASL_MECHANISM").unwrap_or(defaults.sasl_mechanism),
            sasl_username: env::var("KAFKA_SASL_USERNAME").ok(),
            sasl_password: env::var("KAFKA_SASL_PASSWORD").ok(),
            auto_offset_reset: env::var("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or(defaults.auto_offset_reset),
            session_timeout_ms: env_parse("KAFKA_SESSION_TIMEOUT_MS", defaults.session_timeout_ms),
            max_poll_interval_ms: env_parse(
                "KAFKA_MAX_POLL_INTERVAL_MS",
                defaults.max_poll_interval_ms,
            ),
            poll_timeout: Duration::from_millis(env_parse(
                "KAFKA_POLL_TIMEOUT_MS",
                defaults.poll_timeout.as_millis() as u64,
            )),
        }
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// librdkafka settings; auto-commit is always off
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("group.id", &self.group_id)
            .set("bootstrap.servers", &self.brokers)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("max.poll.interval.ms", self.max_poll_interval_ms.to_string())
            .set("enable.partition.eof", "false")
            .set("security.protocol", &self.security_protocol);

        if self.security_protocol.to_ascii_uppercase().starts_with("SASL") {
            config.set("sasl.mechanisms", &self.sasl_mechanism);
            if let Some(username) = &self.sasl_username {
                config.set("sasl.username", username);
            }
            if let Some(password) = &self.sasl_password {
                config.set("sasl.password", password);
            }
        }

        config
    }
}

/// Accepts a JSON array (`["a","b"]`) or a comma-separated list
pub fn parse_topics(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<String>>(trimmed) {
            Ok(topics) => return topics.into_iter().filter(|t| !t.is_empty()).collect(),
            Err(e) => warn!(error = %e, "KAFKA_TOPICS is not a valid JSON array, splitting on commas"),
        }
    }

    trimmed
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|t| t.trim().trim_matches('"').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse an env var, warning and falling back on bad values
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = %default, "Invalid numeric setting, using default");
            default
        }),
        Err(_) => default,
    }
}
