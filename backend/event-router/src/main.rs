use anyhow::{bail, Context};
use aws_config::{BehaviorVersion, Region};
use dead_letter::{DeadLetterSink, KafkaDeadLetterConfig, KafkaDeadLetterSink, SqsDeadLetterSink};
use event_consumer::{ops_server, shutdown_signal, ConsumerLoop, KafkaSource};
use event_router::{
    Config, EnvelopeCodec, EventBridgeClient, EventBridgePublisher, PropagationPipeline,
    RouterProcessor,
};
use resilience::CircuitBreaker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,event_router=debug,resilience=debug".into());

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
        source_region = %config.source_region,
        target_region = %config.partner_region,
        event_bus = %config.event_bus_name,
        topics = ?config.kafka.topics,
        "Starting event-router"
    );

    let local = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let partner = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.partner_region.clone()))
        .load()
        .await;

    let dead_letter: Arc<dyn DeadLetterSink> = match (&config.dlq_url, &config.dlq_topic) {
        (Some(url), _) => Arc::new(SqsDeadLetterSink::new(aws_sdk_sqs::Client::new(&local), url)),
        (None, Some(topic)) => Arc::new(
            KafkaDeadLetterSink::new(KafkaDeadLetterConfig {
                brokers: config.kafka.brokers.clone(),
                topic: topic.clone(),
                ..KafkaDeadLetterConfig::default()
            })
            .context("Failed to create Kafka dead-letter producer")?,
        ),
        (None, None) => bail!("DLQ_URL or DLQ_TOPIC must be set"),
    };

    let client = Arc::new(EventBridgeClient::new(aws_sdk_eventbridge::Client::new(
        &partner,
    )));
    let publisher = EventBridgePublisher::new(client, &config.event_bus_name, "event-router");
    let breaker = Arc::new(CircuitBreaker::named(
        "cross-region",
        config.circuit_breaker(),
    ));
    let pipeline = PropagationPipeline::new(
        publisher,
        breaker,
        dead_letter.clone(),
        &config.source_region,
    )
    .with_codec(EnvelopeCodec::zstd(config.zstd_level));
    let processor = RouterProcessor::new(pipeline, &config.partner_region);

    let source = KafkaSource::new(&config.kafka).context("Failed to create Kafka consumer")?;
    let mut consumer =
        ConsumerLoop::new(source, config.loop_settings()).with_dead_letter(dead_letter);

    let server = ops_server(config.metrics_port, consumer.health())
        .context("Failed to bind ops HTTP server")?;
    let server_handle = server.handle();
    tokio::spawn(server);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer_task =
        tokio::spawn(async move { consumer.consume(shutdown_rx, &processor).await });

    let result = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutting down event-router");
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
