//! Consumer metrics, registered in the default Prometheus registry on first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::time::Duration;

static MESSAGES_CONSUMED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kafka_messages_consumed_total",
        "Messages received from Kafka",
        &["topic", "partition", "consumer_group"]
    )
    .expect("Failed to register kafka_messages_consumed_total")
});

static CONSUMER_LAG: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "kafka_consumer_lag_seconds",
        "Seconds between publish and receipt of the last message",
        &["topic", "partition"]
    )
    .expect("Failed to register kafka_consumer_lag_seconds")
});

static PROCESSING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "kafka_processing_duration_seconds",
        "Time spent processing one message",
        &["topic", "consumer_group"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register kafka_processing_duration_seconds")
});

static PROCESSING_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kafka_processing_errors_total",
        "Messages whose processing failed",
        &["topic", "error_type"]
    )
    .expect("Failed to register kafka_processing_errors_total")
});

static COMMIT_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kafka_commit_errors_total",
        "Offset commits that failed",
        &["topic"]
    )
    .expect("Failed to register kafka_commit_errors_total")
});

static POLL_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kafka_poll_errors_total",
        "Non-fatal errors returned by poll",
        &["consumer_group"]
    )
    .expect("Failed to register kafka_poll_errors_total")
});

pub fn record_consumed(topic: &str, partition: i32, consumer_group: &str, lag: Duration) {
    let partition = partition.to_string();
    MESSAGES_CONSUMED
        .with_label_values(&[topic, &partition, consumer_group])
        .inc();
    CONSUMER_LAG
        .with_label_values(&[topic, &partition])
        .set(lag.as_secs_f64());
}

pub fn record_processing(topic: &str, consumer_group: &str, elapsed: Duration) {
    PROCESSING_DURATION
        .with_label_values(&[topic, consumer_group])
        .observe(elapsed.as_secs_f64());
}

pub fn record_processing_error(topic: &str, error_type: &str) {
    PROCESSING_ERRORS.with_label_values(&[topic, error_type]).inc();
}

pub fn record_commit_error(topic: &str) {
    COMMIT_ERRORS.with_label_values(&[topic]).inc();
}

pub fn record_poll_error(consumer_group: &str) {
    POLL_ERRORS.with_label_values(&[consumer_group]).inc();
}
