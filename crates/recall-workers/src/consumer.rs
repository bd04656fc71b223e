//! The consume/dispatch/acknowledge loop shared by all worker variants.
//!
//! Every delivery runs through the same discipline:
//!
//! 1. parse the body as JSON, discarding poison messages,
//! 2. extract the verbatim `job_id` correlation key,
//! 3. validate the request against the worker's schema,
//! 4. skip silently if the job's scope is already cancelled,
//! 5. run the worker (retries and escalation live inside `process`),
//! 6. publish the outcome to the results exchange,
//! 7. acknowledge only after the publish succeeded.
//!
//! A failed publish withholds the acknowledgment so the broker redelivers the
//! job once the channel goes away; every other path acknowledges, because
//! redelivering a malformed or invalid request can never turn it valid.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::{FutureExt, StreamExt};
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::FieldTable;
use lapin::Channel;
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use recall_core::message::{JobStatus, ResultMessage};
use recall_core::{Result, ResultSink};

use crate::cancellation::CancellationRegistry;

/// What a worker's `process` resolved to.
#[derive(Debug)]
pub enum JobOutcome {
    /// Publish a success result with this payload.
    Success(JsonValue),
    /// Publish an error result with this payload.
    ///
    /// The payload shape is the worker's own; aggregation, for example,
    /// reports a placeholder final summary rather than a bare message.
    Failed(JsonValue),
    /// The scope was cancelled mid-job; acknowledge without publishing.
    Cancelled,
}

/// Whether the delivery should be acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    /// Leave unacknowledged; the broker redelivers when the channel closes.
    NoAck,
}

/// One worker variant: its queue binding, result identity, request schema,
/// and job body. The consumer loop owns everything else.
#[async_trait::async_trait]
pub trait JobProcessor: Send + Sync {
    /// Queue this worker consumes from.
    fn queue(&self) -> &'static str;

    /// Routing key its results are published under.
    fn result_routing_key(&self) -> &'static str;

    /// `type` field stamped on every result message.
    fn message_type(&self) -> &'static str;

    /// Validate the request, returning the job's cancellation scope.
    fn validate(&self, request: &JsonValue) -> Result<String>;

    /// Run the job. Retries, escalation, and mid-job cancellation checks all
    /// happen in here; the return value is terminal.
    async fn process(&self, request: &JsonValue) -> JobOutcome;
}

fn extract_job_id(request: &JsonValue) -> Option<JsonValue> {
    match request.get("job_id") {
        Some(JsonValue::Null) | None => None,
        Some(id) => Some(id.clone()),
    }
}

fn result_with_payload(
    message_type: &str,
    job_id: JsonValue,
    status: JobStatus,
    payload: JsonValue,
) -> ResultMessage {
    ResultMessage {
        message_type: message_type.to_string(),
        job_id,
        status,
        payload,
        timestamp: Utc::now(),
    }
}

/// Run one delivery through the dispatch discipline.
///
/// Pure with respect to the broker: the caller applies the returned
/// [`AckDecision`] to the delivery.
pub async fn dispatch(
    body: &[u8],
    processor: &dyn JobProcessor,
    registry: &CancellationRegistry,
    sink: &dyn ResultSink,
) -> AckDecision {
    let request: JsonValue = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Discarding malformed job message");
            return AckDecision::Ack;
        }
    };

    // Without a correlation key no result can be attributed; discard.
    let job_id = match extract_job_id(&request) {
        Some(id) => id,
        None => {
            warn!("Discarding job message without job_id");
            return AckDecision::Ack;
        }
    };

    let scope = match processor.validate(&request) {
        Ok(scope) => scope,
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Job request failed validation");
            let result = ResultMessage::error(processor.message_type(), job_id, e.to_string());
            if let Err(publish_err) = sink.publish(processor.result_routing_key(), &result).await {
                error!(error = %publish_err, "Failed to publish validation error result");
            }
            // Redelivery cannot fix an invalid request.
            return AckDecision::Ack;
        }
    };

    if registry.is_cancelled(&scope) {
        info!(job_id = %job_id, scope = %scope, "Skipping job for cancelled scope");
        return AckDecision::Ack;
    }

    let outcome = match AssertUnwindSafe(processor.process(&request))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(job_id = %job_id, "Job processing panicked");
            let result = ResultMessage::error(
                processor.message_type(),
                job_id,
                "internal error while processing job",
            );
            if let Err(e) = sink.publish(processor.result_routing_key(), &result).await {
                error!(error = %e, "Failed to publish panic error result");
            }
            return AckDecision::Ack;
        }
    };

    let result = match outcome {
        JobOutcome::Success(payload) => result_with_payload(
            processor.message_type(),
            job_id,
            JobStatus::Success,
            payload,
        ),
        JobOutcome::Failed(payload) => {
            result_with_payload(processor.message_type(), job_id, JobStatus::Error, payload)
        }
        JobOutcome::Cancelled => {
            info!(scope = %scope, "Job cancelled mid-flight, discarding");
            return AckDecision::Ack;
        }
    };

    match sink.publish(processor.result_routing_key(), &result).await {
        Ok(()) => AckDecision::Ack,
        Err(e) => {
            error!(error = %e, "Result publish failed, withholding ack for redelivery");
            AckDecision::NoAck
        }
    }
}

/// Consume the worker's queue until the stream ends (connection loss).
///
/// Callers wrap this in a reconnect loop; an `Err` or a clean return both
/// mean the channel is gone.
pub async fn run_consumer(
    channel: &Channel,
    processor: Arc<dyn JobProcessor>,
    registry: CancellationRegistry,
    sink: Arc<dyn ResultSink>,
) -> Result<()> {
    let mut consumer = channel
        .basic_consume(
            processor.queue(),
            processor.message_type(),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(queue = processor.queue(), "Consuming jobs");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;

        let decision =
            dispatch(&delivery.data, processor.as_ref(), &registry, sink.as_ref()).await;

        match decision {
            AckDecision::Ack => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    warn!(error = %e, "Acknowledgment failed; broker will redeliver");
                }
            }
            AckDecision::NoAck => {
                // Deliberately left unacknowledged. The job is redelivered
                // once this channel closes, which a broken publish path makes
                // likely anyway.
            }
        }
    }

    Ok(())
}
