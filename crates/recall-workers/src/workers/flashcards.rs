//! Flashcard worker: one summary chunk in, a list of question/answer cards out.
//!
//! The model is asked for a bare JSON list but routinely fences it; output is
//! fence-stripped before parsing, and a mis-shaped response becomes the next
//! attempt's corrective feedback.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::info;

use recall_core::message::{Flashcard, FlashcardRequest};
use recall_core::{defaults, CompletionBackend, Result};

use crate::attempt::{AttemptEngine, AttemptOutcome, AttemptPolicy};
use crate::cancellation::CancellationRegistry;
use crate::consumer::{JobOutcome, JobProcessor};
use crate::workers::{render_prompt, strip_code_fences, FLASHCARD_PROMPT};

/// Parse model output into cards, tolerant of code fences.
pub(crate) fn parse_flashcards(raw: &str) -> std::result::Result<Vec<Flashcard>, String> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|e| {
        format!(
            "expected a JSON list of objects with question and answer fields: {}",
            e
        )
    })
}

pub struct FlashcardWorker {
    backend: Arc<dyn CompletionBackend>,
    registry: CancellationRegistry,
    policy: AttemptPolicy,
}

impl FlashcardWorker {
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
}

#[async_trait::async_trait]
impl JobProcessor for FlashcardWorker {
    fn queue(&self) -> &'static str {
        defaults::QUEUE_FLASHCARD_GENERATION_JOB
    }

    fn result_routing_key(&self) -> &'static str {
        defaults::ROUTING_FLASHCARD_GENERATION_RESULT
    }

    fn message_type(&self) -> &'static str {
        "flashcard_generation"
    }

    fn validate(&self, request: &JsonValue) -> Result<String> {
        Ok(FlashcardRequest::parse(request)?.scope())
    }

    async fn process(&self, request: &JsonValue) -> JobOutcome {
        let req = match FlashcardRequest::parse(request) {
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
                |feedback| render_prompt(FLASHCARD_PROMPT, feedback, &req.text),
                parse_flashcards,
            )
            .await;

        match outcome {
            AttemptOutcome::Success(flashcards) => {
                let duration = started.elapsed().as_secs_f64();
                info!(
                    job_id = %req.job_id,
                    cards = flashcards.len(),
                    duration_ms = (duration * 1000.0) as u64,
                    "Flashcards generated"
                );
                JobOutcome::Success(json!({
                    "flashcards": flashcards,
                    "summary_chunk_id": req.summary_chunk_id,
                    "duration": duration,
                }))
            }
            AttemptOutcome::Failed(msg) => JobOutcome::Failed(json!({ "msg": msg })),
            AttemptOutcome::Cancelled => JobOutcome::Cancelled,
        }
    }
}
