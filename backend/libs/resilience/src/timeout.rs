/// Timeout wrapper for async operations
use crate::metrics::TimeoutMetrics;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error("{0}")]
    OperationFailed(E),
}

/// Execute a future with timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError<()>>
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(value) => {
            TimeoutMetrics::record_operation("completed");
            Ok(value)
        }
        Err(_) => {
            TimeoutMetrics::record_operation("elapsed");
            Err(TimeoutError::Elapsed(duration))
        }
    }
}

/// Execute a fallible future with timeout, keeping the operation's own error
pub async fn with_timeout_result<F, T, E>(
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => {
            TimeoutMetrics::record_operation("success");
            Ok(result)
        }
        Ok(Err(e)) => {
            TimeoutMetrics::record_operation("failure");
            Err(TimeoutError::OperationFailed(e))
        }
        Err(_) => {
            TimeoutMetrics::record_operation("elapsed");
            Err(TimeoutError::Elapsed(duration))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_elapsed() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
    }

    #[tokio::test]
    async fn test_timeout_result_operation_failed() {
        let result = with_timeout_result(Duration::from_secs(1), async {
            Err::<i32, _>("operation failed")
        })
        .await;

        match result {
            Err(TimeoutError::OperationFailed(e)) => assert_eq!(e, "operation failed"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
