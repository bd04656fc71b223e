//! End-to-end dispatch tests: real worker processors driven through the
//! delivery discipline with a scripted completion backend and a recording
//! result sink, no broker involved.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value as JsonValue};

use recall_core::message::{JobStatus, ResultMessage};
use recall_core::{Error, Result, ResultSink};
use recall_inference::MockCompletionBackend;
use recall_workers::{
    dispatch, AckDecision, AggregationWorker, AttemptPolicy, CancellationRegistry,
    FlashcardWorker, SummaryWorker,
};

#[derive(Default)]
struct RecordingSink {
    published: Mutex<Vec<(String, ResultMessage)>>,
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingSink {
    fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        sink
    }

    fn published(&self) -> Vec<(String, ResultMessage)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ResultSink for RecordingSink {
    async fn publish(&self, routing_key: &str, message: &ResultMessage) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::Publish("scripted failure".into()));
        }
        self.published
            .lock()
            .unwrap()
            .push((routing_key.to_string(), message.clone()));
        Ok(())
    }
}

fn body(value: JsonValue) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

fn summary_job() -> Vec<u8> {
    body(json!({
        "job_id": 100,
        "category_id": 7,
        "chunk_number": 0,
        "text": "chapter one text"
    }))
}

#[tokio::test]
async fn summary_job_flows_to_result_exchange() {
    let backend = MockCompletionBackend::new().then_ok("a summary");
    let registry = CancellationRegistry::new();
    let worker = SummaryWorker::new(Arc::new(backend), registry.clone())
        .with_policy(AttemptPolicy::summary().without_delay());
    let sink = RecordingSink::default();

    let decision = dispatch(&summary_job(), &worker, &registry, &sink).await;

    assert_eq!(decision, AckDecision::Ack);
    let published = sink.published();
    assert_eq!(published.len(), 1);
    let (routing_key, msg) = &published[0];
    assert_eq!(routing_key, "worker.summary.generation.result");
    assert_eq!(msg.message_type, "summary_generation");
    assert_eq!(msg.status, JobStatus::Success);
    assert_eq!(msg.job_id, json!(100));
    assert_eq!(msg.payload["summary"], "a summary");
    assert_eq!(msg.payload["chunk_number"], 0);
}

#[tokio::test]
async fn string_job_id_is_echoed_verbatim() {
    let backend = MockCompletionBackend::new().then_ok("a summary");
    let registry = CancellationRegistry::new();
    let worker = SummaryWorker::new(Arc::new(backend), registry.clone())
        .with_policy(AttemptPolicy::summary().without_delay());
    let sink = RecordingSink::default();
    let job = body(json!({
        "job_id": "job-abc",
        "category_id": 7,
        "chunk_number": 1,
        "text": "text"
    }));

    dispatch(&job, &worker, &registry, &sink).await;

    assert_eq!(sink.published()[0].1.job_id, json!("job-abc"));
}

#[tokio::test]
async fn cancelled_scope_suppresses_generation_and_result() {
    let backend = MockCompletionBackend::new();
    let probe = backend.clone();
    let registry = CancellationRegistry::new();
    registry.cancel("7");
    let worker = SummaryWorker::new(Arc::new(backend), registry.clone())
        .with_policy(AttemptPolicy::summary().without_delay());
    let sink = RecordingSink::default();

    let decision = dispatch(&summary_job(), &worker, &registry, &sink).await;

    assert_eq!(decision, AckDecision::Ack);
    assert!(sink.published().is_empty());
    assert_eq!(probe.call_count(), 0);
}

#[tokio::test]
async fn flashcard_job_retries_bad_shape_then_publishes() {
    let backend = MockCompletionBackend::new()
        .then_ok("no json here")
        .then_ok("```json\n[{\"question\": \"Q\", \"answer\": \"A\"}]\n```");
    let probe = backend.clone();
    let registry = CancellationRegistry::new();
    let worker = FlashcardWorker::new(Arc::new(backend), registry.clone())
        .with_policy(AttemptPolicy::structured().without_delay());
    let sink = RecordingSink::default();
    let job = body(json!({
        "job_id": 101,
        "category_id": 7,
        "summary_chunk_id": 3,
        "text": "summary text"
    }));

    let decision = dispatch(&job, &worker, &registry, &sink).await;

    assert_eq!(decision, AckDecision::Ack);
    assert_eq!(probe.call_count(), 2);
    let (routing_key, msg) = &sink.published()[0];
    assert_eq!(routing_key, "worker.flashcard.generation.result");
    assert_eq!(msg.status, JobStatus::Success);
    assert_eq!(msg.payload["flashcards"][0]["question"], "Q");
}

#[tokio::test]
async fn aggregation_exhaustion_publishes_placeholder_error() {
    let backend = MockCompletionBackend::new()
        .then_err("overloaded")
        .then_err("overloaded")
        .then_err("overloaded");
    let registry = CancellationRegistry::new();
    let worker = AggregationWorker::new(Arc::new(backend), registry.clone())
        .with_policy(AttemptPolicy::structured().without_delay());
    let sink = RecordingSink::default();
    let job = body(json!({
        "job_id": 102,
        "category_item_id": 9,
        "summaries": ["s1", "s2"],
        "flashcards": []
    }));

    let decision = dispatch(&job, &worker, &registry, &sink).await;

    assert_eq!(decision, AckDecision::Ack);
    let (routing_key, msg) = &sink.published()[0];
    assert_eq!(routing_key, "worker.aggregation.result");
    assert_eq!(msg.status, JobStatus::Error);
    assert_eq!(msg.payload["final_summary"], "Error generating final summary.");
    assert!(msg.payload["final_flashcards"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn publish_failure_withholds_ack_for_redelivery() {
    let backend = MockCompletionBackend::new().then_ok("a summary");
    let registry = CancellationRegistry::new();
    let worker = SummaryWorker::new(Arc::new(backend), registry.clone())
        .with_policy(AttemptPolicy::summary().without_delay());
    let sink = RecordingSink::failing();

    let decision = dispatch(&summary_job(), &worker, &registry, &sink).await;

    assert_eq!(decision, AckDecision::NoAck);
}

#[tokio::test]
async fn invalid_request_publishes_validation_error() {
    let backend = MockCompletionBackend::new();
    let probe = backend.clone();
    let registry = CancellationRegistry::new();
    let worker = SummaryWorker::new(Arc::new(backend), registry.clone())
        .with_policy(AttemptPolicy::summary().without_delay());
    let sink = RecordingSink::default();
    let job = body(json!({ "job_id": 103, "category_id": 7, "chunk_number": 0, "text": "" }));

    let decision = dispatch(&job, &worker, &registry, &sink).await;

    assert_eq!(decision, AckDecision::Ack);
    assert_eq!(probe.call_count(), 0);
    let msg = &sink.published()[0].1;
    assert_eq!(msg.status, JobStatus::Error);
    assert!(msg.payload["msg"].as_str().unwrap().contains("text"));
}
