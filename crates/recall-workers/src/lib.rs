//! # recall-workers
//!
//! Broker-driven job processing workers for the recall pipeline.
//!
//! This crate provides:
//! - The retry/model-escalation attempt engine driving completion calls
//! - The cooperative, scope-keyed cancellation registry and its fanout listener
//! - The acknowledgment and publish discipline (ack only after a successful
//!   publish on a fresh connection)
//! - The four worker variants (text extraction, summary, flashcards,
//!   aggregation) as thin [`JobProcessor`] instantiations
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use recall_workers::{
//!     broker, run_consumer, AmqpResultPublisher, CancellationRegistry, RabbitConfig,
//!     SummaryWorker,
//! };
//! use recall_inference::GeminiBackend;
//!
//! let config = RabbitConfig::from_env();
//! let backend = Arc::new(GeminiBackend::from_env()?);
//! let registry = CancellationRegistry::new();
//! let processor = Arc::new(SummaryWorker::new(backend, registry.clone()));
//! let sink = Arc::new(AmqpResultPublisher::new(config.clone()));
//!
//! let (_conn, channel) = broker::connect_with_retry(&config, "summary-generation-worker").await;
//! run_consumer(&channel, processor, registry, sink).await?;
//! ```

pub mod attempt;
pub mod broker;
pub mod cancellation;
pub mod config;
pub mod consumer;
pub mod publisher;
pub mod workers;

pub use attempt::{AttemptEngine, AttemptOutcome, AttemptPolicy};
pub use cancellation::{run_cancellation_listener, CancellationRegistry};
pub use config::RabbitConfig;
pub use consumer::{dispatch, run_consumer, AckDecision, JobOutcome, JobProcessor};
pub use publisher::AmqpResultPublisher;
pub use workers::{
    AggregationWorker, ExtractionWorker, FlashcardWorker, HttpTextExtractor, SummaryWorker,
};
