use crate::dispatcher::ChangeHandler;
use crate::error::HandlerError;
use async_trait::async_trait;
use event_schema::ChangeEvent;
use tracing::info;

/// Records every change in the log and applies nothing
#[derive(Debug, Clone, Default)]
pub struct LoggingHandler;

impl LoggingHandler {
    fn log(&self, event: &ChangeEvent) {
        info!(
            operation = %event.operation,
            schema = %event.schema,
            table = %event.table_name,
            primary_keys = %serde_json::Value::Object(event.primary_keys.clone()),
            transaction_id = event.transaction_id.as_deref().unwrap_or(""),
            offset = event.metadata.offset,
            partition = event.metadata.partition,
            "Change event received"
        );
    }
}

#[async_trait]
impl ChangeHandler for LoggingHandler {
    async fn handle_insert(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.log(event);
        Ok(())
    }

    async fn handle_update(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.log(event);
        Ok(())
    }

    async fn handle_delete(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.log(event);
        Ok(())
    }

    async fn handle_refresh(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.log(event);
        Ok(())
    }
}
