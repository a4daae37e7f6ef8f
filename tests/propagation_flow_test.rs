//! Propagation Flow Tests
//!
//! Purpose: drive both services end to end through the consumer loop, with the
//! broker, replica table, event bus and dead-letter queue replaced by
//! in-process fakes.
//!
//! Test Coverage:
//! 1. Change records land in the replica table and offsets advance
//! 2. A poison record is dead-lettered and the partition moves on
//! 3. A change record is routed cross-region and inflates back on the far side
//! 4. A partner-region outage trips the breaker and everything is dead-lettered
//!
//! Run: cargo test --test propagation_flow_test

use async_trait::async_trait;
use cdc_consumer::{
    CdcDispatcher, ChangeEventParser, HandlerError, ReplicaHandler, ReplicaKey, ReplicaStore,
};
use dead_letter::InMemoryDeadLetterSink;
use event_consumer::{ConsumerLoop, InboundMessage, LoopSettings, MessageSource};
use event_router::{
    BusEntry, EntryResult, EnvelopeCodec, EventBridgePublisher, EventBusClient,
    PropagationPipeline, PublishError, RouterProcessor,
};
use event_schema::{CrossRegionEnvelope, RowImage};
use parking_lot::Mutex;
use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Single-partition topic; stops the loop once drained
struct Topic {
    name: &'static str,
    pending: Mutex<VecDeque<InboundMessage>>,
    committed: Mutex<Vec<i64>>,
    stop: watch::Sender<bool>,
}

impl Topic {
    fn new(name: &'static str, payloads: Vec<Value>, stop: watch::Sender<bool>) -> Self {
        let pending = payloads
            .into_iter()
            .enumerate()
            .map(|(offset, payload)| {
                InboundMessage::new(name, 0, offset as i64, serde_json::to_vec(&payload).unwrap())
                    .with_publish_time(chrono::Utc::now())
            })
            .collect();
        Self {
            name,
            pending: Mutex::new(pending),
            committed: Mutex::new(Vec::new()),
            stop,
        }
    }

    fn committed(&self) -> Vec<i64> {
        self.committed.lock().clone()
    }
}

#[async_trait]
impl MessageSource for Topic {
    async fn poll(&self, _timeout: Duration) -> event_consumer::Result<Option<InboundMessage>> {
        let next = self.pending.lock().pop_front();
        if next.is_none() {
            let _ = self.stop.send(true);
        }
        Ok(next)
    }

    async fn commit(&self, message: &InboundMessage) -> event_consumer::Result<()> {
        assert_eq!(message.topic, self.name);
        self.committed.lock().push(message.offset);
        Ok(())
    }

    async fn rewind(&self, message: &InboundMessage) -> event_consumer::Result<()> {
        self.pending.lock().push_front(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct ReplicaTable {
    rows: Mutex<HashMap<String, RowImage>>,
}

#[async_trait]
impl ReplicaStore for ReplicaTable {
    async fn upsert(&self, key: &ReplicaKey, row: &RowImage) -> Result<(), HandlerError> {
        self.rows.lock().insert(key.storage_key(), row.clone());
        Ok(())
    }

    async fn remove(&self, key: &ReplicaKey) -> Result<(), HandlerError> {
        self.rows.lock().remove(&key.storage_key());
        Ok(())
    }
}

#[derive(Default)]
struct PartnerBus {
    down: AtomicBool,
    received: Mutex<Vec<BusEntry>>,
}

#[async_trait]
impl EventBusClient for PartnerBus {
    async fn put_events(&self, entries: Vec<BusEntry>) -> Result<Vec<EntryResult>, PublishError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PublishError::Api("endpoint unreachable".into()));
        }
        let results = entries.iter().map(|_| EntryResult::accepted("id")).collect();
        self.received.lock().extend(entries);
        Ok(results)
    }
}

fn settings(max_delivery_attempts: Option<u32>) -> LoopSettings {
    LoopSettings {
        consumer_group: "flow-test".into(),
        poll_timeout: Duration::from_millis(5),
        max_delivery_attempts,
        backoff: RetryConfig {
            max_retries: u32::MAX,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

fn change(operation: &str, id: i64, before: Value, after: Value) -> Value {
    json!({
        "operation": operation,
        "table_name": "customers",
        "schema": "dbo",
        "timestamp": "2024-03-01T12:00:00Z",
        "before": before,
        "after": after,
        "primary_keys": {"customer_id": id},
        "metadata": {
            "source_database": "crm",
            "source_table": "customers",
            "offset": id,
            "partition": 0,
            "capture_time": "2024-03-01T12:00:00Z"
        }
    })
}

fn router(
    bus: Arc<PartnerBus>,
    sink: Arc<InMemoryDeadLetterSink>,
    max_failures: u32,
) -> RouterProcessor<PartnerBus> {
    let publisher = EventBridgePublisher::new(bus, "replication-bus", "event-router").with_retry(
        RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        },
    );
    let breaker = CircuitBreaker::named(
        "cross-region",
        CircuitBreakerConfig {
            failure_threshold: max_failures,
            timeout: Duration::from_secs(60),
            ..CircuitBreakerConfig::default()
        },
    );
    RouterProcessor::new(
        PropagationPipeline::new(publisher, Arc::new(breaker), sink, "us-east-1"),
        "us-west-2",
    )
}

#[tokio::test]
async fn test_changes_reach_the_replica_table() {
    let (stop, rx) = watch::channel(false);
    let topic = Topic::new(
        "qlik.customers",
        vec![
            change("INSERT", 1, Value::Null, json!({"customer_id": 1, "tier": "silver"})),
            change("INSERT", 2, Value::Null, json!({"customer_id": 2, "tier": "bronze"})),
            change(
                "UPDATE",
                1,
                json!({"customer_id": 1, "tier": "silver"}),
                json!({"customer_id": 1, "tier": "gold"}),
            ),
            change("DELETE", 2, json!({"customer_id": 2, "tier": "bronze"}), Value::Null),
        ],
        stop,
    );

    let table = Arc::new(ReplicaTable::default());
    let dispatcher = CdcDispatcher::new(
        ChangeEventParser::new(),
        Arc::new(ReplicaHandler::new(table.clone())),
    );
    let mut consumer = ConsumerLoop::new(topic, settings(Some(5)));
    consumer.consume(rx, &dispatcher).await.unwrap();

    assert_eq!(consumer.source().committed(), vec![0, 1, 2, 3]);
    let rows = table.rows.lock();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows["dbo.customers#customer_id=1"]["tier"], json!("gold"));
}

#[tokio::test]
async fn test_poison_record_is_dead_lettered_and_partition_advances() {
    let (stop, rx) = watch::channel(false);
    let topic = Topic::new(
        "qlik.customers",
        vec![
            change("MERGE", 1, Value::Null, json!({"customer_id": 1})),
            change("INSERT", 2, Value::Null, json!({"customer_id": 2})),
        ],
        stop,
    );

    let table = Arc::new(ReplicaTable::default());
    let sink = Arc::new(InMemoryDeadLetterSink::new());
    let dispatcher = CdcDispatcher::new(
        ChangeEventParser::new(),
        Arc::new(ReplicaHandler::new(table.clone())),
    );
    let mut consumer =
        ConsumerLoop::new(topic, settings(Some(3))).with_dead_letter(sink.clone());
    consumer.consume(rx, &dispatcher).await.unwrap();

    assert_eq!(consumer.source().committed(), vec![0, 1]);
    assert!(table.rows.lock().contains_key("dbo.customers#customer_id=2"));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error_type, "dispatch_error");
    assert!(records[0].error_message.contains("unknown operation"));
    assert_eq!(records[0].failure_count, 3);
    assert_eq!(records[0].source_handler, "cdc-consumer");
}

#[tokio::test]
async fn test_change_record_is_routed_cross_region() {
    let (stop, rx) = watch::channel(false);
    let topic = Topic::new(
        "replication.source-changes",
        vec![change("INSERT", 5, Value::Null, json!({"customer_id": 5, "tier": "gold"}))],
        stop,
    );

    let bus = Arc::new(PartnerBus::default());
    let sink = Arc::new(InMemoryDeadLetterSink::new());
    let processor = router(bus.clone(), sink.clone(), 5);
    let mut consumer = ConsumerLoop::new(topic, settings(Some(5)));
    consumer.consume(rx, &processor).await.unwrap();

    assert_eq!(consumer.source().committed(), vec![0]);
    assert!(sink.is_empty());

    let received = bus.received.lock().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].detail_type, "cross-region.us-west-2");

    let wire: CrossRegionEnvelope = serde_json::from_str(&received[0].detail).unwrap();
    let envelope = EnvelopeCodec::default().inflate(&wire).unwrap();
    assert_eq!(envelope.event.event_type, "cdc.INSERT");
    assert_eq!(envelope.event.source_region, "us-east-1");
    assert_eq!(envelope.event.metadata.source_service, "crm");
    assert_eq!(envelope.event.payload["after"]["tier"], json!("gold"));
}

#[tokio::test]
async fn test_partner_outage_trips_breaker_and_dead_letters_everything() {
    let (stop, rx) = watch::channel(false);
    let payloads = (0..5)
        .map(|id| change("INSERT", id, Value::Null, json!({"customer_id": id})))
        .collect();
    let topic = Topic::new("replication.source-changes", payloads, stop);

    let bus = Arc::new(PartnerBus::default());
    bus.down.store(true, Ordering::SeqCst);
    let sink = Arc::new(InMemoryDeadLetterSink::new());
    let processor = router(bus.clone(), sink.clone(), 2);
    let mut consumer = ConsumerLoop::new(topic, settings(Some(5)));
    consumer.consume(rx, &processor).await.unwrap();

    assert_eq!(consumer.source().committed(), vec![0, 1, 2, 3, 4]);
    assert_eq!(processor.pipeline().breaker().state(), CircuitState::Open);
    assert!(bus.received.lock().is_empty());

    let records = sink.records();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.error_type == "routing_failure"));
    assert!(records[4].error_message.contains("circuit breaker is open"));
}
