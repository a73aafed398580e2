//! Fake Job Detector - Main Entry Point
//!
//! Answers score, explain and health requests over NATS request/reply.
//! Requests are processed in parallel, bounded by the configured worker count.

use anyhow::Result;
use fake_job_detector::{
    config::{AppConfig, LoggingConfig},
    consumer::PostingConsumer,
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceEngine,
    producer::ReplyProducer,
    service::RequestHandler,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("fake_job_detector={}", logging.level)),
    };

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so it can set up logging
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    info!("Starting Fake Job Detector");
    info!(
        threshold = config.detection.threshold,
        default_top_n = config.detection.default_top_n,
        models_dir = %config.models_dir().display(),
        "Configuration loaded successfully"
    );

    let metrics = Arc::new(ServiceMetrics::new());

    // Load artifacts; a failure leaves the engine serving health as unhealthy
    let engine = Arc::new(InferenceEngine::new(&config));
    if !engine.is_ready() {
        warn!("Model artifacts unavailable, score and explain requests will fail");
    }
    let handler = RequestHandler::new(engine.clone(), metrics.clone());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = PostingConsumer::new(client.clone(), &config.nats);
    let producer = ReplyProducer::new(client.clone());

    let num_workers = config.pipeline.workers;
    info!("Starting request loop with {} parallel workers", num_workers);

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut requests = consumer.subscribe_all().await?;

    while let Some((kind, message)) = requests.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "Worker semaphore closed");
                break;
            }
        };

        let handler = handler.clone();
        let producer = producer.clone();

        tokio::spawn(async move {
            let reply = handler.handle(kind, &message.payload);

            match message.reply {
                Some(inbox) => {
                    if let Err(e) = producer.reply(inbox, reply).await {
                        error!(kind = kind.as_str(), error = %e, "Failed to publish reply");
                    }
                }
                None => {
                    warn!(
                        kind = kind.as_str(),
                        subject = %message.subject,
                        "Request has no reply inbox, reply dropped"
                    );
                }
            }

            drop(permit);
        });
    }

    info!("Detector shutting down...");
    if let Err(e) = producer.flush().await {
        warn!(error = %e, "Failed to flush pending replies");
    }
    if engine.dense_fallbacks() > 0 {
        info!(count = engine.dense_fallbacks(), "Requests scored through the dense fallback");
    }
    metrics.print_summary();

    Ok(())
}
