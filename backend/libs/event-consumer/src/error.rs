use rdkafka::error::KafkaError;
use thiserror::Error;

/// Consumer-side failures (broker I/O, commits, configuration)
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("failed to subscribe to {topics:?}: {source}")]
    Subscription {
        topics: Vec<String>,
        #[source]
        source: KafkaError,
    },

    #[error("offset commit failed: {0}")]
    Commit(String),

    #[error("seek failed: {0}")]
    Rewind(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ConsumerError {
    /// Whether the loop must stop instead of backing off
    pub fn is_fatal(&self) -> bool {
        match self {
            ConsumerError::Subscription { .. } | ConsumerError::Config(_) => true,
            ConsumerError::Kafka(KafkaError::MessageConsumptionFatal(_)) => true,
            ConsumerError::Kafka(KafkaError::Subscription(_)) => true,
            _ => false,
        }
    }
}

/// Why a processor rejected a message. The offset is not committed for any of these.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("handler error: {0}")]
    Handler(String),

    /// A downstream dependency is down (breaker open, timed out). The message
    /// is held for redelivery without spending a delivery attempt.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),
}

impl ProcessingError {
    /// Label used for metrics and dead-letter `error_type`
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessingError::Parse(_) => "parse_error",
            ProcessingError::Dispatch(_) => "dispatch_error",
            ProcessingError::Handler(_) => "handler_error",
            ProcessingError::Unavailable(_) => "unavailable",
        }
    }

    /// Whether the failure counts toward the poison-message limit
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(self, ProcessingError::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ConsumerError>;
