//! Envelope compression for cross-region transfer.
//!
//! The full envelope JSON is zstd-compressed and carried base64-encoded in
//! `payload.compressed_data`; `checksum` is the hex SHA-256 of the compressed
//! bytes. The receiving side calls [`EnvelopeCodec::inflate`] to get the
//! original envelope back.

use crate::error::CompressionError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use event_schema::{CompressionType, CrossRegionEnvelope, RowImage};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

pub const COMPRESSED_DATA_FIELD: &str = "compressed_data";

pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        zstd::encode_all(data, self.level)
    }

    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        zstd::decode_all(data)
    }
}

#[derive(Clone)]
pub struct EnvelopeCodec {
    compressor: Arc<dyn Compressor>,
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(Arc::new(ZstdCompressor::default()))
    }
}

impl EnvelopeCodec {
    pub fn new(compressor: Arc<dyn Compressor>) -> Self {
        Self { compressor }
    }

    pub fn zstd(level: i32) -> Self {
        Self::new(Arc::new(ZstdCompressor::new(level)))
    }

    /// Compressed bytes of the envelope JSON
    pub fn compress(&self, envelope: &CrossRegionEnvelope) -> Result<Vec<u8>, CompressionError> {
        let json = serde_json::to_vec(envelope)?;
        let compressed = self.compressor.compress(&json)?;

        debug!(
            event_id = %envelope.event.event_id,
            original_size = json.len(),
            compressed_size = compressed.len(),
            compression_ratio = json.len() as f64 / compressed.len().max(1) as f64,
            "Compressed event"
        );
        Ok(compressed)
    }

    /// Envelope as published: payload replaced by the compressed form, or the
    /// envelope unchanged with `compression_type = none` when compression fails
    pub fn seal(&self, mut envelope: CrossRegionEnvelope) -> CrossRegionEnvelope {
        envelope.compression_type = CompressionType::Zstd;
        envelope.checksum = None;

        match self.compress(&envelope) {
            Ok(compressed) => {
                let mut payload = RowImage::new();
                payload.insert(
                    COMPRESSED_DATA_FIELD.to_string(),
                    Value::String(STANDARD.encode(&compressed)),
                );
                envelope.event.payload = payload;
                envelope.checksum = Some(checksum(&compressed));
            }
            Err(e) => {
                warn!(
                    error = %e,
                    event_id = %envelope.event.event_id,
                    "Failed to compress event, sending uncompressed"
                );
                envelope.compression_type = CompressionType::Uncompressed;
            }
        }
        envelope
    }

    /// Reverse of [`seal`](Self::seal); uncompressed envelopes pass through
    pub fn inflate(
        &self,
        envelope: &CrossRegionEnvelope,
    ) -> Result<CrossRegionEnvelope, CompressionError> {
        if envelope.compression_type == CompressionType::Uncompressed {
            return Ok(envelope.clone());
        }

        let encoded = envelope
            .event
            .payload
            .get(COMPRESSED_DATA_FIELD)
            .and_then(Value::as_str)
            .ok_or(CompressionError::MissingCompressedData)?;
        let compressed = STANDARD.decode(encoded)?;

        if let Some(expected) = &envelope.checksum {
            let actual = checksum(&compressed);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(CompressionError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let json = self.compressor.decompress(&compressed)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
