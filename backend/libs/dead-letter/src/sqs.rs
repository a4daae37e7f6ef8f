use crate::{
    failure_timestamp, metrics, DeadLetterError, DeadLetterSink, Result, ERROR_MESSAGE_ATTRIBUTE,
    FAILURE_TIMESTAMP_ATTRIBUTE,
};
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::MessageAttributeValue;
use aws_sdk_sqs::Client;
use event_schema::DeadLetterRecord;
use tracing::{debug, error};

/// Dead-letter queue on SQS
#[derive(Clone)]
pub struct SqsDeadLetterSink {
    client: Client,
    queue_url: String,
}

impl SqsDeadLetterSink {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

fn string_attribute(value: String) -> Result<MessageAttributeValue> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| DeadLetterError::Transport(format!("invalid message attribute: {e}")))
}

#[async_trait]
impl DeadLetterSink for SqsDeadLetterSink {
    async fn send(&self, record: &DeadLetterRecord) -> Result<()> {
        let body = record.to_json()?;

        debug!(
            queue_url = %self.queue_url,
            error_type = %record.error_type,
            source_handler = %record.source_handler,
            "Sending record to SQS dead-letter queue"
        );

        let sent = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_attributes(
                ERROR_MESSAGE_ATTRIBUTE,
                string_attribute(record.error_message.clone())?,
            )
            .message_attributes(
                FAILURE_TIMESTAMP_ATTRIBUTE,
                string_attribute(failure_timestamp(record))?,
            )
            .send()
            .await;

        match sent {
            Ok(output) => {
                metrics::record_dead_lettered(&record.source_handler, &record.error_type);
                debug!(
                    message_id = output.message_id().unwrap_or_default(),
                    "Dead-letter record accepted by SQS"
                );
                Ok(())
            }
            Err(e) => {
                metrics::record_send_failure(&record.source_handler, "sqs");
                let detail = DisplayErrorContext(&e).to_string();
                error!(error = %detail, queue_url = %self.queue_url, "Failed to send to SQS dead-letter queue");
                Err(DeadLetterError::Transport(detail))
            }
        }
    }
}
