//! Raw payload → [`ChangeEvent`].
//!
//! Plain JSON is tried first. When that fails and a [`SchemaCodec`] is
//! registered, the codec decodes the bytes into JSON, which is then decoded
//! again as a change record.

use crate::error::ParseError;
use event_schema::{ChangeEvent, SchemaError};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Schema-based binary decoding
pub trait SchemaCodec: Send + Sync {
    fn name(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<Value, ParseError>;
}

/// Schema-registry framing: magic byte `0`, big-endian schema id, JSON body
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistryJsonCodec {
    /// Accepted schema ids; empty accepts any
    allowed_schema_ids: Vec<u32>,
}

const MAGIC_BYTE: u8 = 0;
const HEADER_LEN: usize = 5;

impl SchemaRegistryJsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_schema_ids(mut self, ids: Vec<u32>) -> Self {
        self.allowed_schema_ids = ids;
        self
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Codec {
            codec: self.name().to_string(),
            message: message.into(),
        }
    }
}

impl SchemaCodec for SchemaRegistryJsonCodec {
    fn name(&self) -> &str {
        "schema-registry-json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, ParseError> {
        if bytes.len() < HEADER_LEN || bytes[0] != MAGIC_BYTE {
            return Err(self.error("missing schema-registry header"));
        }

        let schema_id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        if !self.allowed_schema_ids.is_empty() && !self.allowed_schema_ids.contains(&schema_id) {
            return Err(self.error(format!("unexpected schema id {schema_id}")));
        }

        debug!(schema_id, "Decoding schema-registry framed payload");
        serde_json::from_slice(&bytes[HEADER_LEN..]).map_err(|e| self.error(e.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct ChangeEventParser {
    codec: Option<Arc<dyn SchemaCodec>>,
}

impl ChangeEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(mut self, codec: Arc<dyn SchemaCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<ChangeEvent, ParseError> {
        let json_error = match serde_json::from_slice::<ChangeEvent>(bytes) {
            Ok(event) => {
                event.validate()?;
                return Ok(event);
            }
            Err(e) => e,
        };

        let Some(codec) = &self.codec else {
            return Err(ParseError::Invalid(SchemaError::Malformed(json_error)));
        };

        let decoded = codec.decode(bytes)?;
        let reencoded = serde_json::to_vec(&decoded).map_err(SchemaError::from)?;
        Ok(ChangeEvent::from_json(&reencoded)?)
    }
}
