//! CDC consumer: decodes change records from Kafka and applies them to the
//! replica table through an operation-routed [`ChangeHandler`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use dispatcher::{
    CdcDispatcher, ChangeEventParser, ChangeHandler, SchemaCodec, SchemaRegistryJsonCodec,
};
pub use error::{DispatchError, HandlerError, ParseError};
pub use handlers::{DynamoReplicaStore, LoggingHandler, ReplicaHandler, ReplicaKey, ReplicaStore};
