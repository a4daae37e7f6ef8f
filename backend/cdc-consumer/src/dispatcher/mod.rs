//! Operation routing for decoded change records.

pub mod parser;

pub use parser::{ChangeEventParser, SchemaCodec, SchemaRegistryJsonCodec};

use crate::error::{DispatchError, HandlerError};
use crate::metrics;
use async_trait::async_trait;
use event_consumer::{InboundMessage, MessageProcessor, ProcessingError};
use event_schema::{ChangeEvent, ChangeOperation};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Side effects for each change operation.
///
/// Implementations must be idempotent: the same record may be delivered more
/// than once, and applying it twice must leave the same state as applying it once.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn handle_insert(&self, event: &ChangeEvent) -> Result<(), HandlerError>;

    async fn handle_update(&self, event: &ChangeEvent) -> Result<(), HandlerError>;

    async fn handle_delete(&self, event: &ChangeEvent) -> Result<(), HandlerError>;

    async fn handle_refresh(&self, event: &ChangeEvent) -> Result<(), HandlerError>;
}

pub struct CdcDispatcher {
    parser: ChangeEventParser,
    handler: Arc<dyn ChangeHandler>,
    source: String,
}

impl CdcDispatcher {
    pub fn new(parser: ChangeEventParser, handler: Arc<dyn ChangeHandler>) -> Self {
        Self {
            parser,
            handler,
            source: "kafka".to_string(),
        }
    }

    /// Label for the `source` dimension of `cdc_events_processed_total`
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub async fn dispatch(&self, event: &ChangeEvent) -> Result<(), DispatchError> {
        match &event.operation {
            ChangeOperation::Insert => self.handler.handle_insert(event).await?,
            ChangeOperation::Update => self.handler.handle_update(event).await?,
            ChangeOperation::Delete => self.handler.handle_delete(event).await?,
            ChangeOperation::Refresh => self.handler.handle_refresh(event).await?,
            ChangeOperation::Unknown(tag) => {
                return Err(DispatchError::UnknownOperation(tag.clone()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageProcessor for CdcDispatcher {
    async fn process(&self, message: &InboundMessage) -> Result<(), ProcessingError> {
        let started = Instant::now();

        let event = self.parser.parse(&message.payload).map_err(|e| {
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Failed to parse change event"
            );
            metrics::record_failed("parse", "");
            e
        })?;

        debug!(
            operation = %event.operation,
            table = %event.table_name,
            offset = message.offset,
            "Dispatching change event"
        );

        if let Err(e) = self.dispatch(&event).await {
            warn!(
                operation = %event.operation,
                table = %event.table_name,
                offset = message.offset,
                error = %e,
                "Change event dispatch failed"
            );
            metrics::record_failed("dispatch", &event.table_name);
            return Err(e.into());
        }

        metrics::record_processed(
            event.operation.as_str(),
            &event.table_name,
            &self.source,
            started.elapsed(),
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "cdc-consumer"
    }
}
