//! Cross-region event router.
//!
//! Consumes source-region events, wraps each one in a [`CrossRegionEnvelope`],
//! compresses it and publishes it to the partner region's event bus behind a
//! circuit breaker. Anything that cannot be published goes to the dead-letter
//! sink as a `routing_failure`.
//!
//! [`CrossRegionEnvelope`]: event_schema::CrossRegionEnvelope

pub mod compression;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod publisher;
pub mod source;

pub use compression::{checksum, Compressor, EnvelopeCodec, ZstdCompressor};
pub use config::Config;
pub use error::{CompressionError, PublishError, TransportError};
pub use pipeline::{PropagationOutcome, PropagationPipeline, ROUTING_FAILURE};
pub use publisher::{
    BusEntry, BusEvent, EntryResult, EventBridgeClient, EventBridgePublisher, EventBusClient,
    MAX_BATCH_SIZE,
};
pub use source::{decode_source_event, RouterProcessor};
