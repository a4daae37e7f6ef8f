use chrono::{DateTime, TimeZone, Utc};
use rdkafka::message::Message;
use std::time::Duration;

/// Owned copy of a broker message, detached from the consumer's buffers
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    /// Broker/producer timestamp, when the message carries one
    pub publish_time: Option<DateTime<Utc>>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: payload.into(),
            publish_time: None,
        }
    }

    pub fn with_publish_time(mut self, publish_time: DateTime<Utc>) -> Self {
        self.publish_time = Some(publish_time);
        self
    }

    pub fn from_kafka<M: Message>(msg: &M) -> Self {
        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(<[u8]>::to_vec),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            publish_time: msg
                .timestamp()
                .to_millis()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }

    /// now − publish time; zero when unknown or in the future
    pub fn lag(&self, now: DateTime<Utc>) -> Duration {
        self.publish_time
            .and_then(|published| (now - published).to_std().ok())
            .unwrap_or_default()
    }

    /// (topic, partition, offset) identity used for redelivery tracking
    pub fn position(&self) -> (String, i32, i64) {
        (self.topic.clone(), self.partition, self.offset)
    }
}
