use crate::BaseEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    #[serde(rename = "zstd")]
    Zstd,
    #[default]
    #[serde(rename = "none")]
    Uncompressed,
}

impl CompressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::Zstd => "zstd",
            CompressionType::Uncompressed => "none",
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base event bound for a partner region.
///
/// Built per outbound publish and dropped once the attempt resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRegionEnvelope {
    #[serde(flatten)]
    pub event: BaseEvent,
    pub target_region: String,
    pub original_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub compression_type: CompressionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl CrossRegionEnvelope {
    /// Wrap `event` for `target_region`, asking for zstd compression
    pub fn wrap(event: BaseEvent, target_region: impl Into<String>) -> Self {
        Self {
            original_timestamp: event.timestamp,
            event,
            target_region: target_region.into(),
            compression_type: CompressionType::Zstd,
            checksum: None,
        }
    }

    /// Event bus detail-type for cross-region traffic
    pub fn detail_type(&self) -> String {
        format!("cross-region.{}", self.target_region)
    }
}
