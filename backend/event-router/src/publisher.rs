//! Event bus publishing with batching and partial-failure retry.

use crate::error::PublishError;
use crate::metrics;
use async_trait::async_trait;
use aws_sdk_eventbridge::error::DisplayErrorContext;
use aws_sdk_eventbridge::primitives::DateTime as AwsDateTime;
use aws_sdk_eventbridge::types::PutEventsRequestEntry;
use chrono::{DateTime, Utc};
use event_schema::CrossRegionEnvelope;
use resilience::presets::cross_region_config;
use resilience::RetryConfig;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Entries per `PutEvents` request
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct BusEntry {
    pub event_bus_name: String,
    pub source: String,
    pub detail_type: String,
    pub detail: String,
    pub time: DateTime<Utc>,
}

/// Per-entry result, in request order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryResult {
    pub event_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl EntryResult {
    pub fn accepted(event_id: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            ..Default::default()
        }
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_id: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error_code.is_some()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventBusClient: Send + Sync {
    async fn put_events(&self, entries: Vec<BusEntry>) -> Result<Vec<EntryResult>, PublishError>;
}

/// `EventBusClient` over the EventBridge `PutEvents` API
#[derive(Clone)]
pub struct EventBridgeClient {
    client: aws_sdk_eventbridge::Client,
}

impl EventBridgeClient {
    pub fn new(client: aws_sdk_eventbridge::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBusClient for EventBridgeClient {
    async fn put_events(&self, entries: Vec<BusEntry>) -> Result<Vec<EntryResult>, PublishError> {
        let requests = entries
            .into_iter()
            .map(|entry| {
                PutEventsRequestEntry::builder()
                    .event_bus_name(entry.event_bus_name)
                    .source(entry.source)
                    .detail_type(entry.detail_type)
                    .detail(entry.detail)
                    .time(AwsDateTime::from_millis(entry.time.timestamp_millis()))
                    .build()
            })
            .collect::<Vec<_>>();

        let output = self
            .client
            .put_events()
            .set_entries(Some(requests))
            .send()
            .await
            .map_err(|e| PublishError::Api(DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .entries()
            .iter()
            .map(|entry| EntryResult {
                event_id: entry.event_id().map(str::to_string),
                error_code: entry.error_code().map(str::to_string),
                error_message: entry.error_message().map(str::to_string),
            })
            .collect())
    }
}

/// One item of [`EventBridgePublisher::publish_batch`]
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub detail_type: String,
    pub detail: Value,
}

pub struct EventBridgePublisher<C: ?Sized> {
    client: Arc<C>,
    event_bus: String,
    source: String,
    retry: RetryConfig,
    timeout: Duration,
}

impl<C: EventBusClient + ?Sized> EventBridgePublisher<C> {
    pub fn new(client: Arc<C>, event_bus: impl Into<String>, source: impl Into<String>) -> Self {
        let config = cross_region_config();
        Self {
            client,
            event_bus: event_bus.into(),
            source: source.into(),
            retry: config.retry.unwrap_or_default(),
            timeout: config.timeout.duration,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bound on one publish, retries included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn event_bus(&self) -> &str {
        &self.event_bus
    }

    pub async fn publish_event<T>(&self, detail_type: &str, detail: &T) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized,
    {
        let entry = self.entry(detail_type, serde_json::to_string(detail)?);
        self.publish_entries(vec![entry]).await
    }

    /// Publishes in chunks of [`MAX_BATCH_SIZE`], stopping at the first chunk that fails
    pub async fn publish_batch(&self, events: &[BusEvent]) -> Result<(), PublishError> {
        for (index, chunk) in events.chunks(MAX_BATCH_SIZE).enumerate() {
            let entries = chunk
                .iter()
                .map(|event| {
                    Ok(self.entry(&event.detail_type, serde_json::to_string(&event.detail)?))
                })
                .collect::<Result<Vec<_>, PublishError>>()?;

            self.publish_entries(entries).await.map_err(|e| {
                warn!(
                    batch_start = index * MAX_BATCH_SIZE,
                    error = %e,
                    "Failed to publish event batch"
                );
                e
            })?;
        }
        Ok(())
    }

    /// Detail-type `cross-region.<target_region>`
    pub async fn publish_cross_region(
        &self,
        envelope: &CrossRegionEnvelope,
    ) -> Result<(), PublishError> {
        self.publish_event(&envelope.detail_type(), envelope).await
    }

    fn entry(&self, detail_type: &str, detail: String) -> BusEntry {
        BusEntry {
            event_bus_name: self.event_bus.clone(),
            source: self.source.clone(),
            detail_type: detail_type.to_string(),
            detail,
            time: Utc::now(),
        }
    }

    async fn publish_entries(&self, entries: Vec<BusEntry>) -> Result<(), PublishError> {
        match tokio::time::timeout(self.timeout, self.publish_with_retry(entries)).await {
            Ok(result) => result,
            Err(_) => {
                metrics::record_publish_error(&self.event_bus, "timeout");
                Err(PublishError::Timeout(self.timeout))
            }
        }
    }

    /// Resubmits only the entries that failed, up to `retry.max_retries` more times
    async fn publish_with_retry(&self, mut entries: Vec<BusEntry>) -> Result<(), PublishError> {
        let max_attempts = self.retry.max_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt - 1)).await;
            }

            let results = match self.client.put_events(entries.clone()).await {
                Ok(results) => results,
                Err(e) => {
                    metrics::record_publish_error(&self.event_bus, "request");
                    warn!(attempt, error = %e, "PutEvents request failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            let total = entries.len();
            let mut failed = Vec::new();
            for (index, entry) in entries.into_iter().enumerate() {
                match results.get(index) {
                    Some(result) if !result.is_failed() => {
                        metrics::record_published(&self.event_bus, &entry.detail_type);
                    }
                    Some(result) => {
                        let code = result.error_code.as_deref().unwrap_or_default();
                        metrics::record_publish_error(&self.event_bus, code);
                        last_error = format!(
                            "entry failed with code {}: {}",
                            code,
                            result.error_message.as_deref().unwrap_or_default()
                        );
                        failed.push(entry);
                    }
                    None => {
                        metrics::record_publish_error(&self.event_bus, "missing_result");
                        last_error = "no result returned for entry".to_string();
                        failed.push(entry);
                    }
                }
            }

            if failed.is_empty() {
                debug!(attempt, entries = total, "Published events");
                return Ok(());
            }

            warn!(
                attempt,
                failed = failed.len(),
                total,
                last_error = %last_error,
                "Some entries were rejected, retrying them"
            );
            entries = failed;
        }

        Err(PublishError::FailedEntries {
            failed: entries.len(),
            attempts: max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use serde_json::json;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn publisher(client: MockEventBusClient) -> EventBridgePublisher<MockEventBusClient> {
        EventBridgePublisher::new(Arc::new(client), "replication-bus", "event-router")
            .with_retry(fast_retry())
    }

    #[tokio::test]
    async fn test_publish_event_builds_entry() {
        let mut client = MockEventBusClient::new();
        client
            .expect_put_events()
            .withf(|entries| {
                entries.len() == 1
                    && entries[0].event_bus_name == "replication-bus"
                    && entries[0].source == "event-router"
                    && entries[0].detail_type == "cross-region.us-west-2"
                    && entries[0].detail == r#"{"a":1}"#
            })
            .times(1)
            .returning(|_| Ok(vec![EntryResult::accepted("evt-1")]));

        publisher(client)
            .publish_event("cross-region.us-west-2", &json!({"a": 1}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_only_failed_entries_are_resubmitted() {
        let mut seq = Sequence::new();
        let mut client = MockEventBusClient::new();
        client
            .expect_put_events()
            .withf(|entries| entries.len() == 3)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vec![
                    EntryResult::accepted("1"),
                    EntryResult::failed("ThrottlingException", "slow down"),
                    EntryResult::accepted("3"),
                ])
            });
        client
            .expect_put_events()
            .withf(|entries| entries.len() == 1 && entries[0].detail == r#"{"n":2}"#)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![EntryResult::accepted("2")]));

        let events: Vec<BusEvent> = (1..=3)
            .map(|n| BusEvent {
                detail_type: "cdc.INSERT".into(),
                detail: json!({"n": n}),
            })
            .collect();
        publisher(client).publish_batch(&events).await.unwrap();
    }

    #[tokio::test]
    async fn test_batches_are_split_at_ten() {
        let mut client = MockEventBusClient::new();
        client
            .expect_put_events()
            .withf(|entries| entries.len() == MAX_BATCH_SIZE)
            .times(2)
            .returning(|entries| Ok(entries.iter().map(|_| EntryResult::accepted("x")).collect()));
        client
            .expect_put_events()
            .withf(|entries| entries.len() == 3)
            .times(1)
            .returning(|entries| Ok(entries.iter().map(|_| EntryResult::accepted("x")).collect()));

        let events: Vec<BusEvent> = (0..23)
            .map(|n| BusEvent {
                detail_type: "cdc.UPDATE".into(),
                detail: json!({"n": n}),
            })
            .collect();
        publisher(client).publish_batch(&events).await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_limit() {
        let mut client = MockEventBusClient::new();
        client
            .expect_put_events()
            .times(4)
            .returning(|_| Ok(vec![EntryResult::failed("InternalFailure", "boom")]));

        let err = publisher(client)
            .publish_event("cdc.DELETE", &json!({}))
            .await
            .unwrap_err();

        match err {
            PublishError::FailedEntries {
                failed,
                attempts,
                last_error,
            } => {
                assert_eq!(failed, 1);
                assert_eq!(attempts, 4);
                assert!(last_error.contains("InternalFailure"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_request_errors_are_retried() {
        let mut seq = Sequence::new();
        let mut client = MockEventBusClient::new();
        client
            .expect_put_events()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(PublishError::Api("connection reset".into())));
        client
            .expect_put_events()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![EntryResult::accepted("ok")]));

        publisher(client)
            .publish_event("cdc.INSERT", &json!({"id": 1}))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_is_bounded_by_timeout() {
        struct Hanging;

        #[async_trait]
        impl EventBusClient for Hanging {
            async fn put_events(
                &self,
                _entries: Vec<BusEntry>,
            ) -> Result<Vec<EntryResult>, PublishError> {
                std::future::pending().await
            }
        }

        let publisher = EventBridgePublisher::new(Arc::new(Hanging), "bus", "event-router")
            .with_timeout(Duration::from_secs(10));
        let err = publisher
            .publish_event("cdc.INSERT", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout(d) if d == Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_cross_region_detail_type() {
        let mut client = MockEventBusClient::new();
        client
            .expect_put_events()
            .withf(|entries| entries[0].detail_type == "cross-region.eu-west-1")
            .times(1)
            .returning(|_| Ok(vec![EntryResult::accepted("ok")]));

        let event = event_schema::BaseEvent::new("cdc.INSERT", "us-east-1", Default::default());
        let envelope = CrossRegionEnvelope::wrap(event, "eu-west-1");
        publisher(client).publish_cross_region(&envelope).await.unwrap();
    }
}
