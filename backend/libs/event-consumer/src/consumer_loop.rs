//! Poll → process → commit loop with manual acknowledgment.
//!
//! Offsets are committed only after the processor succeeds. A failed message is
//! rewound and redelivered, which keeps in-partition order. With a dead-letter
//! sink and a delivery limit, a message that keeps failing is dead-lettered and
//! committed so the partition can advance. Failures marked unavailable do not
//! count toward that limit; the message is held until the dependency recovers.

use crate::error::{ProcessingError, Result};
use crate::health::ConsumerErrorState;
use crate::message::InboundMessage;
use crate::metrics;
use crate::source::{MessageProcessor, MessageSource};
use chrono::{DateTime, Utc};
use dead_letter::DeadLetterSink;
use event_schema::DeadLetterRecord;
use resilience::{presets, with_retry, RetryConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub consumer_group: String,
    pub poll_timeout: Duration,
    /// Deliveries before a failing message is dead-lettered; `None` retries forever
    pub max_delivery_attempts: Option<u32>,
    /// Backoff between redeliveries and after poll errors
    pub backoff: RetryConfig,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            consumer_group: "cdc-consumers".to_string(),
            poll_timeout: Duration::from_secs(1),
            max_delivery_attempts: Some(5),
            backoff: presets::consumer_backoff_config(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FailureHistory {
    attempts: u32,
    first_failure: DateTime<Utc>,
}

pub struct ConsumerLoop<S> {
    source: S,
    settings: LoopSettings,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    dead_letter_retry: RetryConfig,
    rewind_retry: RetryConfig,
    health: Arc<ConsumerErrorState>,
    failures: HashMap<(String, i32, i64), FailureHistory>,
}

impl<S: MessageSource> ConsumerLoop<S> {
    pub fn new(source: S, settings: LoopSettings) -> Self {
        Self {
            source,
            settings,
            dead_letter: None,
            dead_letter_retry: presets::dead_letter_retry_config(),
            rewind_retry: presets::rewind_retry_config(),
            health: Arc::new(ConsumerErrorState::new()),
            failures: HashMap::new(),
        }
    }

    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    /// Retry policy for a single dead-letter hand-off
    pub fn with_dead_letter_retry(mut self, retry: RetryConfig) -> Self {
        self.dead_letter_retry = retry;
        self
    }

    /// Retry policy for seeking back to a failed message
    pub fn with_rewind_retry(mut self, retry: RetryConfig) -> Self {
        self.rewind_retry = retry;
        self
    }

    /// Shared error state, for readiness checks
    pub fn health(&self) -> Arc<ConsumerErrorState> {
        self.health.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run until `shutdown` flips to true (or its sender is dropped), a fatal
    /// broker error occurs, or a failed message cannot be rewound. The signal
    /// is checked between messages only.
    pub async fn consume<P>(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
        processor: &P,
    ) -> Result<()>
    where
        P: MessageProcessor + ?Sized,
    {
        info!(
            consumer_group = %self.settings.consumer_group,
            handler = processor.name(),
            max_delivery_attempts = ?self.settings.max_delivery_attempts,
            "Starting consumer loop"
        );

        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                info!("Shutdown signal received, stopping consumer loop");
                return Ok(());
            }

            let message = match self.source.poll(self.settings.poll_timeout).await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Fatal consumer error, stopping consumer loop");
                    return Err(e);
                }
                Err(e) => {
                    let errors = self.health.record_error();
                    metrics::record_poll_error(&self.settings.consumer_group);
                    warn!(error = %e, consecutive_errors = errors, "Kafka consumer error");
                    self.backoff(errors, &mut shutdown).await;
                    continue;
                }
            };

            self.handle(message, processor, &mut shutdown).await?;
        }
    }

    async fn handle<P>(
        &mut self,
        message: InboundMessage,
        processor: &P,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()>
    where
        P: MessageProcessor + ?Sized,
    {
        let group = self.settings.consumer_group.clone();
        metrics::record_consumed(
            &message.topic,
            message.partition,
            &group,
            message.lag(Utc::now()),
        );
        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Received message"
        );

        let started = Instant::now();
        let outcome = processor.process(&message).await;
        metrics::record_processing(&message.topic, &group, started.elapsed());

        let err = match outcome {
            Ok(()) => {
                self.health.record_success();
                self.forget_partition(&message);
                self.commit(&message).await;
                return Ok(());
            }
            Err(err) => err,
        };

        metrics::record_processing_error(&message.topic, err.kind());
        if err.counts_as_attempt() {
            let history = *self
                .failures
                .entry(message.position())
                .and_modify(|h| h.attempts += 1)
                .or_insert_with(|| FailureHistory {
                    attempts: 1,
                    first_failure: Utc::now(),
                });

            error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                attempts = history.attempts,
                error = %err,
                "Failed to process message, offset not committed"
            );

            if self.delivery_exhausted(history.attempts)
                && self
                    .dead_letter_message(&message, &err, history, processor.name())
                    .await
            {
                self.health.record_success();
                self.forget_partition(&message);
                self.commit(&message).await;
                return Ok(());
            }
        } else {
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %err,
                "Dependency unavailable, holding message"
            );
        }

        let errors = self.health.record_error();
        self.rewind(&message).await?;
        self.backoff(errors, shutdown).await;
        Ok(())
    }

    /// The fetch position is already past `message`; if the seek cannot be
    /// undone a later commit would skip it, so the loop stops instead.
    async fn rewind(&self, message: &InboundMessage) -> Result<()> {
        with_retry(self.rewind_retry.clone(), || self.source.rewind(message))
            .await
            .map_err(|e| {
                let e = e.into_inner();
                error!(
                    error = %e,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Failed to rewind partition, stopping consumer loop"
                );
                e
            })
    }

    fn delivery_exhausted(&self, attempts: u32) -> bool {
        self.dead_letter.is_some()
            && matches!(self.settings.max_delivery_attempts, Some(limit) if limit > 0 && attempts >= limit)
    }

    /// True once the sink accepted the record
    async fn dead_letter_message(
        &self,
        message: &InboundMessage,
        err: &ProcessingError,
        history: FailureHistory,
        handler: &str,
    ) -> bool {
        let Some(sink) = &self.dead_letter else {
            return false;
        };

        let record = DeadLetterRecord::new(&message.payload, err.kind(), err.to_string(), handler)
            .with_failures(history.attempts, history.first_failure)
            .with_stack_trace(format!(
                "{}[{}]@{}",
                message.topic, message.partition, message.offset
            ));

        let sent = with_retry(self.dead_letter_retry.clone(), || sink.send(&record)).await;
        match sent {
            Ok(()) => {
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    attempts = history.attempts,
                    error_type = err.kind(),
                    "Message dead-lettered after repeated failures"
                );
                true
            }
            Err(e) => {
                error!(
                    error = %e,
                    topic = %message.topic,
                    offset = message.offset,
                    "Dead-letter hand-off failed, message will be redelivered"
                );
                false
            }
        }
    }

    async fn commit(&self, message: &InboundMessage) {
        if let Err(e) = self.source.commit(message).await {
            metrics::record_commit_error(&message.topic);
            error!(
                error = %e,
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Failed to commit offset"
            );
        }
    }

    fn forget_partition(&mut self, message: &InboundMessage) {
        self.failures
            .retain(|(topic, partition, _), _| !(topic == &message.topic && *partition == message.partition));
    }

    async fn backoff(&self, attempt: u32, shutdown: &mut watch::Receiver<bool>) {
        let delay = self.settings.backoff.delay_for_attempt(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {}
        }
    }
}
