//! Flashcard generation worker binary.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use recall_inference::GeminiBackend;
use recall_workers::{
    broker, run_cancellation_listener, run_consumer, AmqpResultPublisher, CancellationRegistry,
    FlashcardWorker, RabbitConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RabbitConfig::from_env();
    let backend = Arc::new(GeminiBackend::from_env()?);
    let registry = CancellationRegistry::new();
    let sink = Arc::new(AmqpResultPublisher::new(config.clone()));
    let processor = Arc::new(FlashcardWorker::new(backend, registry.clone()));

    tokio::spawn(run_cancellation_listener(config.clone(), registry.clone()));

    tracing::info!("Flashcard generation worker starting");

    loop {
        let (_connection, channel) =
            broker::connect_with_retry(&config, "flashcard-generation-worker").await;

        if let Err(e) =
            run_consumer(&channel, processor.clone(), registry.clone(), sink.clone()).await
        {
            error!(error = %e, "Consumer stream failed");
        }
        warn!("Consumer stream ended, reconnecting");
    }
}
