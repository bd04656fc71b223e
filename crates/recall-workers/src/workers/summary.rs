//! Summary worker: one chunk of text in, one plain-text summary out.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::info;

use recall_core::message::SummaryRequest;
use recall_core::{defaults, CompletionBackend, Result};

use crate::attempt::{AttemptEngine, AttemptOutcome, AttemptPolicy};
use crate::cancellation::CancellationRegistry;
use crate::consumer::{JobOutcome, JobProcessor};
use crate::workers::{render_prompt, SUMMARY_PROMPT};

pub struct SummaryWorker {
    backend: Arc<dyn CompletionBackend>,
    registry: CancellationRegistry,
    policy: AttemptPolicy,
}

impl SummaryWorker {
    pub fn new(backend: Arc<dyn CompletionBackend>, registry: CancellationRegistry) -> Self {
        Self {
            backend,
            registry,
            policy: AttemptPolicy::summary(),
        }
    }

    /// Override the attempt policy (tests).
    pub fn with_policy(mut self, policy: AttemptPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait::async_trait]
impl JobProcessor for SummaryWorker {
    fn queue(&self) -> &'static str {
        defaults::QUEUE_SUMMARY_GENERATION_JOB
    }

    fn result_routing_key(&self) -> &'static str {
        defaults::ROUTING_SUMMARY_GENERATION_RESULT
    }

    fn message_type(&self) -> &'static str {
        "summary_generation"
    }

    fn validate(&self, request: &JsonValue) -> Result<String> {
        Ok(SummaryRequest::parse(request)?.scope())
    }

    async fn process(&self, request: &JsonValue) -> JobOutcome {
        let req = match SummaryRequest::parse(request) {
            Ok(req) => req,
            Err(e) => return JobOutcome::Failed(json!({ "msg": e.to_string() })),
        };

        let started = Instant::now();
        let engine = AttemptEngine::new(
            self.backend.as_ref(),
            &self.registry,
            self.policy.clone(),
        );

        let outcome = engine
            .run(
                &req.scope(),
                |feedback| render_prompt(SUMMARY_PROMPT, feedback, &req.text),
                |raw| {
                    let summary = raw.trim();
                    if summary.is_empty() {
                        Err("model returned an empty summary".to_string())
                    } else {
                        Ok(summary.to_string())
                    }
                },
            )
            .await;

        match outcome {
            AttemptOutcome::Success(summary) => {
                let duration = started.elapsed().as_secs_f64();
                info!(
                    job_id = %req.job_id,
                    chunk_number = req.chunk_number,
                    duration_ms = (duration * 1000.0) as u64,
                    "Summary generated"
                );
                JobOutcome::Success(json!({
                    "summary": summary,
                    "category_id": req.category_id,
                    "chunk_number": req.chunk_number,
                    "duration": duration,
                }))
            }
            AttemptOutcome::Failed(msg) => JobOutcome::Failed(json!({ "msg": msg })),
            AttemptOutcome::Cancelled => JobOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_inference::MockCompletionBackend;

    fn request() -> JsonValue {
        json!({
            "job_id": 21,
            "category_id": 5,
            "chunk_number": 2,
            "text": "chunk body"
        })
    }

    fn worker(backend: MockCompletionBackend) -> SummaryWorker {
        let registry = CancellationRegistry::new();
        SummaryWorker::new(Arc::new(backend), registry)
            .with_policy(AttemptPolicy::summary().without_delay())
    }

    #[tokio::test]
    async fn test_summary_success_payload() {
        let backend = MockCompletionBackend::new().then_ok("  a tight summary  ");
        let worker = worker(backend);

        match worker.process(&request()).await {
            JobOutcome::Success(payload) => {
                assert_eq!(payload["summary"], "a tight summary");
                assert_eq!(payload["category_id"], 5);
                assert_eq!(payload["chunk_number"], 2);
                assert!(payload["duration"].is_f64());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_summary_prompt_contains_chunk_text() {
        let backend = MockCompletionBackend::new().then_ok("summary");
        let probe = backend.clone();
        let worker = worker(backend);

        let _ = worker.process(&request()).await;

        assert!(probe.calls()[0].prompt.contains("chunk body"));
    }

    #[tokio::test]
    async fn test_empty_model_output_is_retried() {
        let backend = MockCompletionBackend::new().then_ok("   ").then_ok("real summary");
        let probe = backend.clone();
        let worker = worker(backend);

        match worker.process(&request()).await {
            JobOutcome::Success(payload) => assert_eq!(payload["summary"], "real summary"),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(probe.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_scope_yields_cancelled_outcome() {
        let backend = MockCompletionBackend::new();
        let probe = backend.clone();
        let registry = CancellationRegistry::new();
        registry.cancel("5");
        let worker = SummaryWorker::new(Arc::new(backend), registry)
            .with_policy(AttemptPolicy::summary().without_delay());

        assert!(matches!(
            worker.process(&request()).await,
            JobOutcome::Cancelled
        ));
        assert_eq!(probe.call_count(), 0);
    }
}
