/// Resilience patterns for the propagation services
///
/// This library provides:
/// - **Circuit Breaker**: fails fast once a dependency keeps failing, retries after a cooldown
/// - **Timeout**: bounds every external call
/// - **Retry**: exponential backoff with jitter for transient failures
/// - **Preset Configurations**: tuned settings for cross-region publishing, consumer backoff
///   and replica writes
///
/// # Example: event bus publish behind a breaker
///
/// ```rust,no_run
/// use resilience::{presets, CircuitBreaker};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::cross_region_config();
///     let circuit_breaker = CircuitBreaker::named("cross-region", config.circuit_breaker);
///
///     let result = circuit_breaker.call(|| async {
///         // Your publish call here
///         Ok::<_, String>(())
///     }).await;
/// }
/// ```

pub mod circuit_breaker;
pub mod metrics;
pub mod presets;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerSnapshot,
    CircuitState,
};
pub use presets::{
    consumer_backoff_config, cross_region_config, dead_letter_retry_config, replica_store_config,
    rewind_retry_config, ServiceConfig,
};
pub use retry::{with_retry, RetryConfig, RetryError};
pub use timeout::{with_timeout, with_timeout_result, TimeoutConfig, TimeoutError};
