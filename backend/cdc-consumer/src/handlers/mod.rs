pub mod dynamodb;
pub mod logging;
pub mod replica;

pub use dynamodb::DynamoReplicaStore;
pub use logging::LoggingHandler;
pub use replica::{ReplicaHandler, ReplicaKey, ReplicaStore};
