use crate::error::{ProcessingError, Result};
use crate::message::InboundMessage;
use async_trait::async_trait;
use std::time::Duration;

/// Broker-facing side of the consumption loop
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait up to `timeout` for the next message; `None` when nothing arrived
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundMessage>>;

    /// Synchronously acknowledge `message` (commits `offset + 1`)
    async fn commit(&self, message: &InboundMessage) -> Result<()>;

    /// Reposition the partition so `message` is delivered again
    async fn rewind(&self, message: &InboundMessage) -> Result<()>;
}

/// Per-message work driven by the loop
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Fully apply `message` or fail; partial effects must be idempotent on replay
    async fn process(&self, message: &InboundMessage) -> std::result::Result<(), ProcessingError>;

    /// Handler name stamped on dead-letter records
    fn name(&self) -> &str;
}
