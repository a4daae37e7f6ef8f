//! Router metrics, registered in the default Prometheus registry on first use.

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use std::time::Duration;

static CROSS_REGION_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cross_region_events_total",
        "Events routed to the partner region, by outcome",
        &["source_region", "target_region", "outcome"]
    )
    .expect("Failed to register cross_region_events_total")
});

static CROSS_REGION_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cross_region_latency_seconds",
        "Time from the original event timestamp to partner-region delivery",
        &["source_region", "target_region"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register cross_region_latency_seconds")
});

static EVENTS_PUBLISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "eventbridge_events_published_total",
        "Entries accepted by the event bus",
        &["event_bus", "detail_type"]
    )
    .expect("Failed to register eventbridge_events_published_total")
});

static PUBLISH_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "eventbridge_errors_total",
        "Rejected entries and failed PutEvents requests",
        &["event_bus", "error_code"]
    )
    .expect("Failed to register eventbridge_errors_total")
});

pub fn record_propagation(source_region: &str, target_region: &str, outcome: &str) {
    CROSS_REGION_EVENTS
        .with_label_values(&[source_region, target_region, outcome])
        .inc();
}

pub fn record_latency(source_region: &str, target_region: &str, latency: Duration) {
    CROSS_REGION_LATENCY
        .with_label_values(&[source_region, target_region])
        .observe(latency.as_secs_f64());
}

pub fn record_published(event_bus: &str, detail_type: &str) {
    EVENTS_PUBLISHED
        .with_label_values(&[event_bus, detail_type])
        .inc();
}

pub fn record_publish_error(event_bus: &str, error_code: &str) {
    PUBLISH_ERRORS
        .with_label_values(&[event_bus, error_code])
        .inc();
}
