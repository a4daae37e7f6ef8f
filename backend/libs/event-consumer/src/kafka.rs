use crate::config::KafkaConsumerConfig;
use crate::error::{ConsumerError, Result};
use crate::message::InboundMessage;
use crate::source::MessageSource;
use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use std::time::Duration;
use tracing::{debug, error, info};

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// [`MessageSource`] over an rdkafka `StreamConsumer` with manual commits
pub struct KafkaSource {
    consumer: StreamConsumer,
    topics: Vec<String>,
}

impl KafkaSource {
    /// Create the consumer and subscribe to the configured topics
    pub fn new(config: &KafkaConsumerConfig) -> Result<Self> {
        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            topics = ?config.topics,
            "Initializing Kafka consumer"
        );

        let consumer: StreamConsumer = config.client_config().create().map_err(|e| {
            error!("Failed to create Kafka consumer: {}", e);
            ConsumerError::Kafka(e)
        })?;

        let topic_refs: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topic_refs).map_err(|e| {
            error!("Failed to subscribe to topics: {}", e);
            ConsumerError::Subscription {
                topics: config.topics.clone(),
                source: e,
            }
        })?;

        info!(topics = ?config.topics, "Kafka consumer subscribed");

        Ok(Self {
            consumer,
            topics: config.topics.clone(),
        })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(msg)) => Ok(Some(InboundMessage::from_kafka(&msg))),
            Ok(Err(e)) => Err(ConsumerError::Kafka(e)),
        }
    }

    async fn commit(&self, message: &InboundMessage) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(|e| ConsumerError::Commit(e.to_string()))?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| ConsumerError::Commit(e.to_string()))?;

        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Committed offset"
        );
        Ok(())
    }

    async fn rewind(&self, message: &InboundMessage) -> Result<()> {
        self.consumer
            .seek(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset),
                SEEK_TIMEOUT,
            )
            .map_err(|e| ConsumerError::Rewind(e.to_string()))
    }
}
