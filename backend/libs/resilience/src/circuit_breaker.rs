/// Circuit breaker guarding a fallible async call
///
/// State transitions:
/// - Closed → Open: when the failure count reaches `failure_threshold`
/// - Open → HalfOpen: on the first call after `timeout` has elapsed (that call is let through)
/// - HalfOpen → Closed: after `success_threshold` successes, resetting the failure count
/// - HalfOpen → Open: on any failure
///
/// With `serialize_calls` (the default) the admission check, the wrapped call and the
/// state update run under one async gate, so at most one protected call is in flight.
use crate::metrics::CircuitBreakerMetrics;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Circuit is open, requests fail fast
    Open,
    /// Probing whether the dependency recovered
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0 closed, 1 open, 2 half-open
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure count that trips the circuit open
    pub failure_threshold: u32,
    /// Successes in HalfOpen needed to close the circuit
    pub success_threshold: u32,
    /// Duration to stay Open before letting a trial call through
    pub timeout: Duration,
    /// Hold one lock across check, call and update
    pub serialize_calls: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            serialize_calls: true,
        }
    }
}

/// Point-in-time view of the breaker, for monitoring and tests
#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Instant>,
    pub last_state_change: Instant,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error("{0}")]
    CallFailed(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open)
    }

    /// The wrapped call's error, if the call ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Open => None,
            CircuitBreakerError::CallFailed(e) => Some(e),
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    gate: Arc<tokio::sync::Mutex<()>>,
    state: Arc<Mutex<BreakerState>>,
}

struct BreakerState {
    current: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    last_state_change: Instant,
}

impl BreakerState {
    fn transition(&mut self, name: &str, to: CircuitState) {
        let from = self.current;
        self.current = to;
        self.last_state_change = Instant::now();
        CircuitBreakerMetrics::record_state_transition(name, from.as_str(), to.as_str());
        CircuitBreakerMetrics::set_state(name, to.as_gauge());
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::named("default", config)
    }

    /// Breaker whose metrics and logs carry `name`
    pub fn named(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name: String = name.into();
        CircuitBreakerMetrics::set_state(&name, CircuitState::Closed.as_gauge());
        Self {
            name: Arc::from(name),
            config,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            state: Arc::new(Mutex::new(BreakerState {
                current: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                last_state_change: Instant::now(),
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute a future with circuit breaker protection.
    ///
    /// The call's own error comes back untouched in `CallFailed`.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _gate = if self.config.serialize_calls {
            Some(self.gate.lock().await)
        } else {
            None
        };

        if !self.admit() {
            CircuitBreakerMetrics::record_call(&self.name, "open", "rejected");
            return Err(CircuitBreakerError::Open);
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitBreakerError::CallFailed(e))
            }
        }
    }

    fn admit(&self) -> bool {
        let mut state = self.state.lock();

        match state.current {
            CircuitState::Open => {
                if state.last_state_change.elapsed() >= self.config.timeout {
                    info!(breaker = %self.name, "Circuit breaker: Open → HalfOpen");
                    state.success_count = 0;
                    state.transition(&self.name, CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen | CircuitState::Closed => true,
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        state.success_count += 1;
        CircuitBreakerMetrics::record_call(&self.name, state.current.as_str(), "success");

        if state.current == CircuitState::HalfOpen
            && state.success_count >= self.config.success_threshold
        {
            info!(breaker = %self.name, "Circuit breaker: HalfOpen → Closed");
            state.failure_count = 0;
            state.transition(&self.name, CircuitState::Closed);
        }
    }

    fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
        CircuitBreakerMetrics::record_failure(&self.name);
        CircuitBreakerMetrics::record_call(&self.name, state.current.as_str(), "failure");

        match state.current {
            CircuitState::HalfOpen => {
                warn!(
                    breaker = %self.name,
                    failure_count = state.failure_count,
                    "Circuit breaker: HalfOpen → Open (trial call failed)"
                );
                state.transition(&self.name, CircuitState::Open);
            }
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                warn!(
                    breaker = %self.name,
                    failure_count = state.failure_count,
                    "Circuit breaker: Closed → Open"
                );
                state.transition(&self.name, CircuitState::Open);
            }
            _ => {
                debug!(
                    breaker = %self.name,
                    failure_count = state.failure_count,
                    "Circuit breaker recorded failure"
                );
            }
        }
    }

    /// Get current circuit state (for monitoring)
    pub fn state(&self) -> CircuitState {
        self.state.lock().current
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.state.lock();
        CircuitBreakerSnapshot {
            state: state.current,
            failure_count: state.failure_count,
            success_count: state.success_count,
            last_failure_time: state.last_failure_time,
            last_state_change: state.last_state_change,
        }
    }
}
