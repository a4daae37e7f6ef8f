use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

static DLQ_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "dlq_messages_total",
        "Records handed to the dead-letter sink",
        &["source", "error_type"]
    )
    .expect("Failed to register dlq_messages_total")
});

static DLQ_SEND_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "dlq_send_failures_total",
        "Dead-letter hand-offs that failed",
        &["source", "sink"]
    )
    .expect("Failed to register dlq_send_failures_total")
});

pub fn record_dead_lettered(source: &str, error_type: &str) {
    DLQ_MESSAGES.with_label_values(&[source, error_type]).inc();
}

pub fn record_send_failure(source: &str, sink: &str) {
    DLQ_SEND_FAILURES.with_label_values(&[source, sink]).inc();
}
