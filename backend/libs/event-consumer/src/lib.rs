//! At-least-once Kafka consumption with manual offset commits
//!
//! [`ConsumerLoop`] polls a [`MessageSource`], hands each message to a
//! [`MessageProcessor`], and commits only on success. Processors must be
//! idempotent: a message may be delivered again after a crash, a failed commit
//! or a processing failure.
//!
//! ```rust,no_run
//! use event_consumer::{ConsumerLoop, KafkaConsumerConfig, KafkaSource, LoopSettings};
//! # async fn run(processor: &dyn event_consumer::MessageProcessor) -> anyhow::Result<()> {
//! let config = KafkaConsumerConfig::from_env();
//! let source = KafkaSource::new(&config)?;
//! let (_tx, rx) = tokio::sync::watch::channel(false);
//! ConsumerLoop::new(source, LoopSettings::default()).consume(rx, processor).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer_loop;
pub mod error;
pub mod health;
pub mod kafka;
pub mod message;
pub mod metrics;
pub mod ops;
pub mod source;

pub use config::{env_parse, parse_topics, KafkaConsumerConfig};
pub use consumer_loop::{ConsumerLoop, LoopSettings};
pub use error::{ConsumerError, ProcessingError, Result};
pub use health::{ConsumerErrorState, ConsumerStatus};
pub use kafka::KafkaSource;
pub use message::InboundMessage;
pub use ops::{ops_server, serve_metrics, shutdown_signal};
pub use source::{MessageProcessor, MessageSource};
