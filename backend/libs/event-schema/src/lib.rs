/// Wire schemas shared by the CDC consumer and the cross-region event router
///
/// Every type here is JSON on the wire. Field names follow the upstream
/// change-capture feed (snake_case) so payloads pass through untouched.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub mod base;
pub mod change;
pub mod dead_letter;
pub mod envelope;

// Re-export commonly used types
pub use base::{BaseEvent, EventMetadata, EVENT_VERSION};
pub use change::{ChangeEvent, ChangeMetadata, ChangeOperation};
pub use dead_letter::{DeadLetterRecord, PAYLOAD_ENCODING_BASE64};
pub use envelope::{CompressionType, CrossRegionEnvelope};

/// Ordered column → value image of a row
pub type RowImage = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{operation} event violates row image invariant: {reason}")]
    InvalidImage {
        operation: String,
        reason: &'static str,
    },
    #[error("{operation} event has no primary keys")]
    MissingPrimaryKeys { operation: String },
    #[error("undecodable dead-letter payload: {0}")]
    PayloadEncoding(#[from] base64::DecodeError),
}

/// `null`, absent and `{}` all decode to an empty image
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<RowImage, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RowImage>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn empty_as_null<S>(image: &RowImage, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if image.is_empty() {
        serializer.serialize_none()
    } else {
        image.serialize(serializer)
    }
}
