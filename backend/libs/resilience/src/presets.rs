/// Preset configurations for the propagation paths
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for a protected dependency
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: Option<RetryConfig>,
}

/// Cross-region event bus publishing
///
/// - Timeout: 10s per publish call
/// - Circuit breaker: 5 failures, 30s cooldown, 2 trial successes
/// - Retry: 3 attempts for partially failed batches
pub fn cross_region_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            serialize_calls: true,
        },
        retry: Some(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter: false,
        }),
    }
}

/// Broker consumer failure backoff (no breaker trip; failures block the partition)
///
/// - Retry: 1s doubling up to 60s between redeliveries
pub fn consumer_backoff_config() -> RetryConfig {
    RetryConfig {
        max_retries: u32::MAX,
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(60),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

/// Replica store writes
///
/// - Timeout: 5s
/// - Circuit breaker: 10 failures, 30s cooldown
/// - No retry (the consumer redelivers)
pub fn replica_store_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(5),
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 10,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            serialize_calls: false,
        },
        retry: None,
    }
}

/// Dead-letter queue hand-off
///
/// - Retry: 2 more sends, 50ms then 100ms
pub fn dead_letter_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(500),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Seeking a partition back to a failed offset
///
/// - Retry: 3 more seeks, 100ms doubling up to 1s, then the loop stops
pub fn rewind_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}
