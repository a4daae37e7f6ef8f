use anyhow::Context;
use aws_config::BehaviorVersion;
use cdc_consumer::{
    CdcDispatcher, ChangeEventParser, ChangeHandler, Config, DynamoReplicaStore, LoggingHandler,
    ReplicaHandler, SchemaRegistryJsonCodec,
};
use dead_letter::{DeadLetterSink, KafkaDeadLetterConfig, KafkaDeadLetterSink, SqsDeadLetterSink};
use event_consumer::{ops_server, shutdown_signal, ConsumerLoop, KafkaSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,cdc_consumer=debug,event_consumer=debug".into());

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();
    tracing::info!(
        brokers = %config.kafka.brokers,
        group_id = %config.kafka.group_id,
        topics = ?config.kafka.topics,
        replica_table = ?config.replica_table_name,
        "Starting cdc-consumer"
    );

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;

    let handler: Arc<dyn ChangeHandler> = match &config.replica_table_name {
        Some(table) => {
            tracing::info!(table = %table, "Applying changes to DynamoDB replica table");
            let store = DynamoReplicaStore::new(aws_sdk_dynamodb::Client::new(&aws), table);
            Arc::new(ReplicaHandler::new(Arc::new(store)))
        }
        None => {
            tracing::warn!("REPLICA_TABLE_NAME not set, changes will only be logged");
            Arc::new(LoggingHandler)
        }
    };

    let mut parser = ChangeEventParser::new();
    if config.schema_registry_framing {
        parser = parser.with_codec(Arc::new(SchemaRegistryJsonCodec::new()));
    }
    let dispatcher = CdcDispatcher::new(parser, handler);

    let dead_letter: Option<Arc<dyn DeadLetterSink>> = match (&config.dlq_url, &config.dlq_topic) {
        (Some(url), _) => Some(Arc::new(SqsDeadLetterSink::new(
            aws_sdk_sqs::Client::new(&aws),
            url,
        ))),
        (None, Some(topic)) => Some(Arc::new(
            KafkaDeadLetterSink::new(KafkaDeadLetterConfig {
                brokers: config.kafka.brokers.clone(),
                topic: topic.clone(),
                ..KafkaDeadLetterConfig::default()
            })
            .context("Failed to create Kafka dead-letter producer")?,
        )),
        (None, None) => {
            tracing::warn!("No dead-letter sink configured, failing messages are retried indefinitely");
            None
        }
    };

    let source = KafkaSource::new(&config.kafka).context("Failed to create Kafka consumer")?;
    let mut consumer = ConsumerLoop::new(source, config.loop_settings());
    if let Some(sink) = dead_letter {
        consumer = consumer.with_dead_letter(sink);
    }

    let server = ops_server(config.metrics_port, consumer.health())
        .context("Failed to bind ops HTTP server")?;
    let server_handle = server.handle();
    tokio::spawn(server);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer_task =
        tokio::spawn(async move { consumer.consume(shutdown_rx, &dispatcher).await });

    let result = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutting down cdc-consumer");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut consumer_task).await {
                Ok(joined) => joined.context("Consumer task panicked")?,
                Err(_) => {
                    tracing::warn!("Consumer loop did not stop within {:?}", SHUTDOWN_GRACE);
                    consumer_task.abort();
                    Ok(())
                }
            }
        }
        joined = &mut consumer_task => joined.context("Consumer task panicked")?,
    };

    server_handle.stop(true).await;
    result.context("Consumer loop failed")
}
