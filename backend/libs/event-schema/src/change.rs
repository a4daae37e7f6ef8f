//! Row-level change records emitted by the upstream capture feed.

use crate::{empty_as_null, null_as_empty, BaseEvent, RowImage, SchemaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Operation tag of a change record.
///
/// Unrecognised tags are kept verbatim so dispatch can reject them by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
    /// Full-row resync of an existing key
    Refresh,
    Unknown(String),
}

impl ChangeOperation {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeOperation::Insert => "INSERT",
            ChangeOperation::Update => "UPDATE",
            ChangeOperation::Delete => "DELETE",
            ChangeOperation::Refresh => "REFRESH",
            ChangeOperation::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ChangeOperation::Unknown(_))
    }
}

impl From<String> for ChangeOperation {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "INSERT" => ChangeOperation::Insert,
            "UPDATE" => ChangeOperation::Update,
            "DELETE" => ChangeOperation::Delete,
            "REFRESH" => ChangeOperation::Refresh,
            _ => ChangeOperation::Unknown(tag),
        }
    }
}

impl From<ChangeOperation> for String {
    fn from(op: ChangeOperation) -> Self {
        match op {
            ChangeOperation::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeMetadata {
    pub source_database: String,
    pub source_table: String,
    /// Log sequence number (SQL Server / Postgres sources)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lsn: Option<String>,
    /// System change number (Oracle sources)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scn: Option<String>,
    pub offset: i64,
    pub partition: i32,
    pub capture_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: ChangeOperation,
    pub table_name: String,
    #[serde(default)]
    pub schema: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        serialize_with = "empty_as_null"
    )]
    pub before: RowImage,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        serialize_with = "empty_as_null"
    )]
    pub after: RowImage,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub primary_keys: RowImage,
    #[serde(default)]
    pub metadata: ChangeMetadata,
}

impl ChangeEvent {
    /// Decode one JSON change record and check its row-image invariants
    pub fn from_json(bytes: &[u8]) -> Result<Self, SchemaError> {
        let event: ChangeEvent = serde_json::from_slice(bytes)?;
        event.validate()?;
        Ok(event)
    }

    /// Row-image invariants per operation.
    ///
    /// Unknown operations pass; they are rejected at dispatch.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let invalid = |reason| SchemaError::InvalidImage {
            operation: self.operation.to_string(),
            reason,
        };

        match self.operation {
            ChangeOperation::Insert => {
                if !self.before.is_empty() {
                    return Err(invalid("INSERT must not carry a before image"));
                }
                if self.after.is_empty() {
                    return Err(invalid("INSERT requires an after image"));
                }
            }
            ChangeOperation::Delete => {
                if !self.after.is_empty() {
                    return Err(invalid("DELETE must not carry an after image"));
                }
                if self.before.is_empty() {
                    return Err(invalid("DELETE requires a before image"));
                }
            }
            ChangeOperation::Update => {
                if self.before.is_empty() || self.after.is_empty() {
                    return Err(invalid("UPDATE requires before and after images"));
                }
            }
            ChangeOperation::Refresh => {}
            ChangeOperation::Unknown(_) => return Ok(()),
        }

        if self.primary_keys.is_empty() {
            return Err(SchemaError::MissingPrimaryKeys {
                operation: self.operation.to_string(),
            });
        }
        Ok(())
    }

    /// Current row image: `after`, or `before` for deletes
    pub fn image(&self) -> &RowImage {
        match self.operation {
            ChangeOperation::Delete => &self.before,
            _ => &self.after,
        }
    }

    /// Republish as a `cdc.<OPERATION>` base event
    pub fn to_base_event(&self, source_region: impl Into<String>) -> BaseEvent {
        let mut payload = RowImage::new();
        payload.insert("table".into(), Value::String(self.table_name.clone()));
        payload.insert("operation".into(), Value::String(self.operation.to_string()));
        payload.insert("after".into(), Value::Object(self.after.clone()));
        payload.insert("before".into(), Value::Object(self.before.clone()));
        payload.insert(
            "primary_keys".into(),
            Value::Object(self.primary_keys.clone()),
        );

        let mut event = BaseEvent::new(format!("cdc.{}", self.operation), source_region, payload);
        event.metadata.source_service = self.metadata.source_database.clone();
        event.correlation_id = self.transaction_id.clone();
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(operation: &str, before: Value, after: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "operation": operation,
            "table_name": "customers",
            "schema": "dbo",
            "timestamp": "2024-03-01T12:00:00Z",
            "before": before,
            "after": after,
            "primary_keys": {"id": 7},
            "metadata": {
                "source_database": "crm",
                "source_table": "customers",
                "lsn": "0000002a:00000010:0003",
                "offset": 42,
                "partition": 1,
                "capture_time": "2024-03-01T12:00:00Z"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_insert_has_only_after_image() {
        let event = ChangeEvent::from_json(&record("INSERT", Value::Null, json!({"id": 7, "name": "Ada"}))).unwrap();

        assert_eq!(event.operation, ChangeOperation::Insert);
        assert!(event.before.is_empty());
        assert_eq!(event.after.get("name"), Some(&json!("Ada")));
        assert_eq!(event.metadata.offset, 42);
        assert_eq!(event.metadata.lsn.as_deref(), Some("0000002a:00000010:0003"));
    }

    #[test]
    fn test_delete_has_only_before_image() {
        let event = ChangeEvent::from_json(&record("DELETE", json!({"id": 7}), Value::Null)).unwrap();

        assert!(event.after.is_empty());
        assert!(!event.before.is_empty());
        assert_eq!(event.image(), &event.before);
    }

    #[test]
    fn test_update_requires_both_images() {
        let ok = ChangeEvent::from_json(&record("UPDATE", json!({"id": 7, "v": 1}), json!({"id": 7, "v": 2}))).unwrap();
        assert!(!ok.before.is_empty() && !ok.after.is_empty());

        let err = ChangeEvent::from_json(&record("UPDATE", Value::Null, json!({"id": 7}))).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidImage { .. }));
    }

    #[test]
    fn test_insert_with_before_image_is_rejected() {
        let err = ChangeEvent::from_json(&record("INSERT", json!({"id": 7}), json!({"id": 7}))).unwrap_err();
        assert!(err.to_string().contains("before image"));
    }

    #[test]
    fn test_missing_primary_keys_rejected() {
        let mut value: Value = serde_json::from_slice(&record("INSERT", Value::Null, json!({"id": 1}))).unwrap();
        value["primary_keys"] = json!({});
        let err = ChangeEvent::from_json(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingPrimaryKeys { .. }));
    }

    #[test]
    fn test_unknown_operation_is_preserved() {
        let event = ChangeEvent::from_json(&record("UNKNOWN", Value::Null, Value::Null)).unwrap();
        assert_eq!(event.operation, ChangeOperation::Unknown("UNKNOWN".into()));
        assert!(!event.operation.is_known());
    }

    #[test]
    fn test_absent_primary_keys_reach_validation() {
        let mut value: Value = serde_json::from_slice(&record("UNKNOWN", Value::Null, Value::Null)).unwrap();
        value.as_object_mut().unwrap().remove("primary_keys");
        let unknown = ChangeEvent::from_json(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(unknown.primary_keys.is_empty());
        assert!(!unknown.operation.is_known());

        value["operation"] = json!("REFRESH");
        let err = ChangeEvent::from_json(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingPrimaryKeys { .. }));
    }

    #[test]
    fn test_empty_images_serialize_as_null() {
        let event = ChangeEvent::from_json(&record("INSERT", Value::Null, json!({"id": 7}))).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["before"], Value::Null);
        assert_eq!(value["operation"], json!("INSERT"));
    }

    #[test]
    fn test_to_base_event() {
        let event = ChangeEvent::from_json(&record("UPDATE", json!({"id": 7, "v": 1}), json!({"id": 7, "v": 2}))).unwrap();
        let base = event.to_base_event("us-east-1");

        assert_eq!(base.event_type, "cdc.UPDATE");
        assert_eq!(base.source_region, "us-east-1");
        assert_eq!(base.metadata.source_service, "crm");
        assert_eq!(base.payload["table"], json!("customers"));
        assert_eq!(base.payload["after"]["v"], json!(2));
        assert_eq!(base.payload["primary_keys"]["id"], json!(7));
    }
}
