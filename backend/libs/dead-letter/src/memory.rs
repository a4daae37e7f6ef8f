use crate::{metrics, DeadLetterError, DeadLetterSink, Result};
use async_trait::async_trait;
use event_schema::DeadLetterRecord;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local sink that keeps every record.
///
/// `set_failing(true)` makes subsequent sends fail, for failure-path runs.
#[derive(Default)]
pub struct InMemoryDeadLetterSink {
    records: Mutex<Vec<DeadLetterRecord>>,
    failing: AtomicBool,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn send(&self, record: &DeadLetterRecord) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            metrics::record_send_failure(&record.source_handler, "memory");
            return Err(DeadLetterError::Transport("sink unavailable".to_string()));
        }
        metrics::record_dead_lettered(&record.source_handler, &record.error_type);
        self.records.lock().push(record.clone());
        Ok(())
    }
}
