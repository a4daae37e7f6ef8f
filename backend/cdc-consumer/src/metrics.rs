use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use std::time::Duration;

static EVENTS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cdc_events_processed_total",
        "Change events applied by a handler",
        &["operation", "table", "source"]
    )
    .expect("Failed to register cdc_events_processed_total")
});

static PROCESSING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cdc_processing_duration_seconds",
        "Parse plus handler time for one change event",
        &["operation", "table"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register cdc_processing_duration_seconds")
});

static EVENTS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cdc_events_failed_total",
        "Change events that failed to parse or apply",
        &["stage", "table"]
    )
    .expect("Failed to register cdc_events_failed_total")
});

pub fn record_processed(operation: &str, table: &str, source: &str, elapsed: Duration) {
    EVENTS_PROCESSED
        .with_label_values(&[operation, table, source])
        .inc();
    PROCESSING_DURATION
        .with_label_values(&[operation, table])
        .observe(elapsed.as_secs_f64());
}

/// `table` is empty when the payload never parsed
pub fn record_failed(stage: &str, table: &str) {
    EVENTS_FAILED.with_label_values(&[stage, table]).inc();
}
