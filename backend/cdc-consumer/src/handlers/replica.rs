//! Replica-table handler: upserts after-images and removes deleted rows.

use crate::dispatcher::ChangeHandler;
use crate::error::HandlerError;
use async_trait::async_trait;
use event_schema::{ChangeEvent, RowImage};
use resilience::presets::{replica_store_config, ServiceConfig};
use resilience::{with_timeout_result, CircuitBreaker, CircuitBreakerError, TimeoutError};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Replica row identity: qualified table plus the primary key values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplicaKey {
    pub table: String,
    pub id: String,
}

impl ReplicaKey {
    /// Deterministic for a given row: primary keys are sorted by column name
    pub fn for_event(event: &ChangeEvent) -> Self {
        let table = if event.schema.is_empty() {
            event.table_name.clone()
        } else {
            format!("{}.{}", event.schema, event.table_name)
        };

        let mut columns: Vec<(&String, &Value)> = event.primary_keys.iter().collect();
        columns.sort_by(|a, b| a.0.cmp(b.0));
        let id = columns
            .into_iter()
            .map(|(column, value)| match value {
                Value::String(s) => format!("{column}={s}"),
                other => format!("{column}={other}"),
            })
            .collect::<Vec<_>>()
            .join("#");

        Self { table, id }
    }

    /// Single-attribute partition key (`table#id`)
    pub fn storage_key(&self) -> String {
        format!("{}#{}", self.table, self.id)
    }
}

impl fmt::Display for ReplicaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Keyed row storage; both operations must be idempotent
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    async fn upsert(&self, key: &ReplicaKey, row: &RowImage) -> Result<(), HandlerError>;

    async fn remove(&self, key: &ReplicaKey) -> Result<(), HandlerError>;
}

pub struct ReplicaHandler<S> {
    store: Arc<S>,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl<S: ReplicaStore> ReplicaHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, replica_store_config())
    }

    pub fn with_config(store: Arc<S>, config: ServiceConfig) -> Self {
        Self {
            store,
            breaker: CircuitBreaker::named("replica-store", config.circuit_breaker),
            timeout: config.timeout.duration,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn guarded<F, Fut>(&self, f: F) -> Result<(), HandlerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), HandlerError>>,
    {
        let timeout = self.timeout;
        match self.breaker.call(|| with_timeout_result(timeout, f())).await {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::Open) => Err(HandlerError::Unavailable(
                "circuit breaker is open".to_string(),
            )),
            Err(CircuitBreakerError::CallFailed(TimeoutError::Elapsed(elapsed))) => Err(
                HandlerError::Unavailable(format!("timed out after {elapsed:?}")),
            ),
            Err(CircuitBreakerError::CallFailed(TimeoutError::OperationFailed(e))) => Err(e),
        }
    }

    async fn upsert_after_image(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        if event.after.is_empty() {
            return Err(HandlerError::Rejected(format!(
                "{} on {} carries no after image",
                event.operation, event.table_name
            )));
        }

        let key = ReplicaKey::for_event(event);
        debug!(key = %key, operation = %event.operation, "Upserting replica row");
        self.guarded(|| self.store.upsert(&key, &event.after))
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Replica upsert failed");
                e
            })
    }
}

#[async_trait]
impl<S: ReplicaStore> ChangeHandler for ReplicaHandler<S> {
    async fn handle_insert(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.upsert_after_image(event).await
    }

    async fn handle_update(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.upsert_after_image(event).await
    }

    async fn handle_delete(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        let key = ReplicaKey::for_event(event);
        debug!(key = %key, "Removing replica row");
        self.guarded(|| self.store.remove(&key))
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Replica delete failed");
                e
            })
    }

    async fn handle_refresh(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.upsert_after_image(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        rows: Mutex<HashMap<String, RowImage>>,
    }

    #[async_trait]
    impl ReplicaStore for MapStore {
        async fn upsert(&self, key: &ReplicaKey, row: &RowImage) -> Result<(), HandlerError> {
            self.rows.lock().insert(key.storage_key(), row.clone());
            Ok(())
        }

        async fn remove(&self, key: &ReplicaKey) -> Result<(), HandlerError> {
            self.rows.lock().remove(&key.storage_key());
            Ok(())
        }
    }

    fn event(value: Value) -> ChangeEvent {
        ChangeEvent::from_json(&serde_json::to_vec(&value).unwrap()).unwrap()
    }

    fn insert() -> ChangeEvent {
        event(json!({
            "operation": "INSERT",
            "table_name": "orders",
            "schema": "sales",
            "timestamp": "2024-03-01T12:00:00Z",
            "after": {"region": "eu", "order_id": 7, "total": 12.5},
            "primary_keys": {"region": "eu", "order_id": 7}
        }))
    }

    #[test]
    fn test_key_is_sorted_and_qualified() {
        let key = ReplicaKey::for_event(&insert());
        assert_eq!(key.table, "sales.orders");
        assert_eq!(key.id, "order_id=7#region=eu");
        assert_eq!(key.storage_key(), "sales.orders#order_id=7#region=eu");
    }

    #[tokio::test]
    async fn test_insert_then_delete() {
        let store = Arc::new(MapStore::default());
        let handler = ReplicaHandler::new(store.clone());

        handler.handle_insert(&insert()).await.unwrap();
        assert_eq!(
            store.rows.lock()["sales.orders#order_id=7#region=eu"]["total"],
            json!(12.5)
        );

        let delete = event(json!({
            "operation": "DELETE",
            "table_name": "orders",
            "schema": "sales",
            "timestamp": "2024-03-01T12:01:00Z",
            "before": {"region": "eu", "order_id": 7, "total": 12.5},
            "primary_keys": {"order_id": 7, "region": "eu"}
        }));
        handler.handle_delete(&delete).await.unwrap();
        assert!(store.rows.lock().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_without_after_image_is_rejected() {
        let handler = ReplicaHandler::new(Arc::new(MapStore::default()));
        let refresh = event(json!({
            "operation": "REFRESH",
            "table_name": "orders",
            "schema": "sales",
            "timestamp": "2024-03-01T12:00:00Z",
            "primary_keys": {"order_id": 7}
        }));

        let err = handler.handle_refresh(&refresh).await.unwrap_err();
        assert!(matches!(err, HandlerError::Rejected(_)));
    }
}
