use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Consecutive errors before the consumer reports unhealthy
const UNHEALTHY_ERROR_THRESHOLD: u32 = 10;
/// Failing this long without a success is unhealthy
const UNHEALTHY_STALL: Duration = Duration::from_secs(300);

/// Loop progress shared with the readiness check
#[derive(Debug)]
pub struct ConsumerErrorState {
    consecutive: AtomicU32,
    total: AtomicU64,
    last_success: Mutex<Instant>,
}

impl ConsumerErrorState {
    pub fn new() -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            total: AtomicU64::new(0),
            last_success: Mutex::new(Instant::now()),
        }
    }

    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
        *self.last_success.lock() = Instant::now();
    }

    /// Returns the consecutive error count including this one
    pub fn record_error(&self) -> u32 {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.consecutive.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }

    /// Errors since start, successes do not reset it
    pub fn total_errors(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn time_since_success(&self) -> Duration {
        self.last_success.lock().elapsed()
    }

    pub fn status(&self) -> ConsumerStatus {
        let consecutive_errors = self.consecutive_errors();
        let time_since_last_success = self.time_since_success();
        let stalled = consecutive_errors > 0 && time_since_last_success > UNHEALTHY_STALL;

        ConsumerStatus {
            healthy: consecutive_errors < UNHEALTHY_ERROR_THRESHOLD && !stalled,
            consecutive_errors,
            total_errors: self.total_errors(),
            time_since_last_success,
        }
    }
}

impl Default for ConsumerErrorState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerStatus {
    pub healthy: bool,
    pub consecutive_errors: u32,
    pub total_errors: u64,
    pub time_since_last_success: Duration,
}
