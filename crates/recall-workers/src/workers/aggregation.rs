//! Aggregation worker: merge all chunk summaries into one final summary and
//! deduplicate the collected flashcards.
//!
//! Two engine runs. The final summary is the job: if it cannot be produced the
//! job fails with a placeholder payload. The flashcard pass degrades
//! gracefully: its failure empties `final_flashcards` but the job still
//! succeeds.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use recall_core::message::{AggregationRequest, Flashcard};
use recall_core::{defaults, CompletionBackend, Result};

use crate::attempt::{AttemptEngine, AttemptOutcome, AttemptPolicy};
use crate::cancellation::CancellationRegistry;
use crate::consumer::{JobOutcome, JobProcessor};
use crate::workers::flashcards::parse_flashcards;
use crate::workers::{render_prompt, FINAL_FLASHCARD_PROMPT, FINAL_SUMMARY_PROMPT};

const FAILED_SUMMARY_PLACEHOLDER: &str = "Error generating final summary.";

pub struct AggregationWorker {
    backend: Arc<dyn CompletionBackend>,
    registry: CancellationRegistry,
    policy: AttemptPolicy,
}

impl AggregationWorker {
    pub fn new(backend: Arc<dyn CompletionBackend>, registry: CancellationRegistry) -> Self {
        Self {
            backend,
            registry,
            policy: AttemptPolicy::structured(),
        }
    }

    /// Override the attempt policy (tests).
    pub fn with_policy(mut self, policy: AttemptPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn dedup_flashcards(&self, scope: &str, cards: &[Flashcard]) -> Option<Vec<Flashcard>> {
        let serialized = match serde_json::to_string(cards) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Could not serialize flashcards for aggregation");
                return Some(Vec::new());
            }
        };

        let engine = AttemptEngine::new(
            self.backend.as_ref(),
            &self.registry,
            self.policy.clone(),
        );

        match engine
            .run(
                scope,
                |feedback| render_prompt(FINAL_FLASHCARD_PROMPT, feedback, &serialized),
                parse_flashcards,
            )
            .await
        {
            AttemptOutcome::Success(cards) => Some(cards),
            AttemptOutcome::Failed(msg) => {
                warn!(error = %msg, "Flashcard aggregation failed, publishing without cards");
                Some(Vec::new())
            }
            AttemptOutcome::Cancelled => None,
        }
    }
}

#[async_trait::async_trait]
impl JobProcessor for AggregationWorker {
    fn queue(&self) -> &'static str {
        defaults::QUEUE_AGGREGATION_JOB
    }

    fn result_routing_key(&self) -> &'static str {
        defaults::ROUTING_AGGREGATION_RESULT
    }

    fn message_type(&self) -> &'static str {
        "aggregation"
    }

    fn validate(&self, request: &JsonValue) -> Result<String> {
        Ok(AggregationRequest::parse(request)?.scope())
    }

    async fn process(&self, request: &JsonValue) -> JobOutcome {
        let req = match AggregationRequest::parse(request) {
            Ok(req) => req,
            Err(e) => return JobOutcome::Failed(json!({ "msg": e.to_string() })),
        };

        let started = Instant::now();
        let scope = req.scope();
        let joined = req.summaries.join("\n\n");

        let engine = AttemptEngine::new(
            self.backend.as_ref(),
            &self.registry,
            self.policy.clone(),
        );

        let final_summary = match engine
            .run(
                &scope,
                |feedback| render_prompt(FINAL_SUMMARY_PROMPT, feedback, &joined),
                |raw| {
                    let merged = raw.trim();
                    if merged.is_empty() {
                        Err("model returned an empty final summary".to_string())
                    } else {
                        Ok(merged.to_string())
                    }
                },
            )
            .await
        {
            AttemptOutcome::Success(summary) => summary,
            AttemptOutcome::Failed(msg) => {
                return JobOutcome::Failed(json!({
                    "msg": msg,
                    "final_summary": FAILED_SUMMARY_PLACEHOLDER,
                    "final_flashcards": [],
                    "duration": started.elapsed().as_secs_f64(),
                }));
            }
            AttemptOutcome::Cancelled => return JobOutcome::Cancelled,
        };

        let final_flashcards = if req.flashcards.is_empty() {
            Vec::new()
        } else {
            match self.dedup_flashcards(&scope, &req.flashcards).await {
                Some(cards) => cards,
                None => return JobOutcome::Cancelled,
            }
        };

        let duration = started.elapsed().as_secs_f64();
        info!(
            job_id = %req.job_id,
            summaries = req.summaries.len(),
            cards = final_flashcards.len(),
            duration_ms = (duration * 1000.0) as u64,
            "Aggregation complete"
        );

        JobOutcome::Success(json!({
            "final_summary": final_summary,
            "final_flashcards": final_flashcards,
            "duration": duration,
        }))
    }
}
