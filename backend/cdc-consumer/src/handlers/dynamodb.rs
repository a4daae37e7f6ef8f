use super::replica::{ReplicaKey, ReplicaStore};
use crate::error::HandlerError;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{SecondsFormat, Utc};
use event_schema::RowImage;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::Debug;

pub const PARTITION_KEY: &str = "pk";

/// Service error codes that clear up on their own
const RETRYABLE_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "ThrottlingException",
    "InternalServerError",
    "ServiceUnavailable",
];

/// Replica rows in a DynamoDB table keyed by [`ReplicaKey::storage_key`]
#[derive(Clone)]
pub struct DynamoReplicaStore {
    client: Client,
    table_name: String,
}

impl DynamoReplicaStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl ReplicaStore for DynamoReplicaStore {
    async fn upsert(&self, key: &ReplicaKey, row: &RowImage) -> Result<(), HandlerError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item(key, row)))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn remove(&self, key: &ReplicaKey) -> Result<(), HandlerError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(key.storage_key()))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

/// Throttling, timeouts and transport failures are transient; anything the
/// service rejects outright is not
fn store_error<E, R>(err: SdkError<E, R>) -> HandlerError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service) => match service.err().code() {
            Some(code) if RETRYABLE_CODES.contains(&code) => HandlerError::Unavailable(message),
            _ => HandlerError::Store(message),
        },
        SdkError::ConstructionFailure(_) => HandlerError::Store(message),
        _ => HandlerError::Unavailable(message),
    }
}

fn item(key: &ReplicaKey, row: &RowImage) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (PARTITION_KEY.to_string(), AttributeValue::S(key.storage_key())),
        ("source_table".to_string(), AttributeValue::S(key.table.clone())),
        (
            "image".to_string(),
            AttributeValue::M(
                row.iter()
                    .map(|(column, value)| (column.clone(), to_attribute(value)))
                    .collect(),
            ),
        ),
        (
            "updated_at".to_string(),
            AttributeValue::S(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
    ])
}

pub(crate) fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::operation::put_item::PutItemError;
    use serde_json::json;

    #[test]
    fn test_json_to_attribute_values() {
        let value = json!({"id": 7, "name": "x", "tags": ["a"], "deleted": false, "note": null});
        let AttributeValue::M(map) = to_attribute(&value) else {
            panic!("expected a map attribute");
        };
        assert_eq!(map["id"], AttributeValue::N("7".into()));
        assert_eq!(map["name"], AttributeValue::S("x".into()));
        assert_eq!(map["tags"], AttributeValue::L(vec![AttributeValue::S("a".into())]));
        assert_eq!(map["deleted"], AttributeValue::Bool(false));
        assert_eq!(map["note"], AttributeValue::Null(true));
    }

    #[test]
    fn test_transport_failures_are_transient() {
        let timeout: SdkError<PutItemError, ()> = SdkError::timeout_error("read timed out");
        assert!(matches!(store_error(timeout), HandlerError::Unavailable(_)));

        let construction: SdkError<PutItemError, ()> =
            SdkError::construction_failure("missing table name");
        assert!(matches!(store_error(construction), HandlerError::Store(_)));
    }

    #[test]
    fn test_item_carries_partition_key() {
        let key = ReplicaKey {
            table: "sales.orders".into(),
            id: "order_id=7".into(),
        };
        let row = json!({"order_id": 7}).as_object().cloned().unwrap();
        let item = item(&key, &row);
        assert_eq!(
            item[PARTITION_KEY],
            AttributeValue::S("sales.orders#order_id=7".into())
        );
        assert!(item.contains_key("updated_at"));
    }
}
