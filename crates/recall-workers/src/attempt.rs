//! Retry/model-escalation state machine for completion calls.
//!
//! One engine run drives up to `max_attempts` calls against the completion
//! backend for a single job, checking the cancellation registry before every
//! attempt, escalating to the fallback model once at a fixed attempt index,
//! and feeding the previous failure back into the next prompt as corrective
//! feedback. Parse failures of structured output are retried exactly like
//! transport failures.

use std::time::Duration;

use tracing::{debug, info, warn};

use recall_core::{defaults, CompletionBackend};

use crate::cancellation::CancellationRegistry;

/// Per-job-kind attempt constants.
#[derive(Debug, Clone)]
pub struct AttemptPolicy {
    pub max_attempts: u32,
    /// Attempt index (0-based) from which the fallback model is used.
    pub escalation_index: u32,
    pub retry_delay: Duration,
    pub default_model: String,
    pub fallback_model: String,
}

impl AttemptPolicy {
    /// Policy for single-chunk summary generation.
    pub fn summary() -> Self {
        Self {
            max_attempts: defaults::SUMMARY_MAX_ATTEMPTS,
            escalation_index: defaults::SUMMARY_ESCALATION_INDEX,
            retry_delay: Duration::from_secs(defaults::SUMMARY_RETRY_DELAY_SECS),
            default_model: defaults::DEFAULT_MODEL.to_string(),
            fallback_model: defaults::FALLBACK_MODEL.to_string(),
        }
    }

    /// Policy for structured-output jobs (flashcards, aggregation).
    pub fn structured() -> Self {
        Self {
            max_attempts: defaults::STRUCTURED_MAX_ATTEMPTS,
            escalation_index: defaults::STRUCTURED_ESCALATION_INDEX,
            retry_delay: Duration::from_secs(defaults::STRUCTURED_RETRY_DELAY_SECS),
            default_model: defaults::DEFAULT_MODEL.to_string(),
            fallback_model: defaults::FALLBACK_MODEL.to_string(),
        }
    }

    /// Drop the inter-attempt delay (tests).
    pub fn without_delay(mut self) -> Self {
        self.retry_delay = Duration::ZERO;
        self
    }

    fn model_for(&self, attempt: u32) -> &str {
        if attempt >= self.escalation_index {
            &self.fallback_model
        } else {
            &self.default_model
        }
    }
}

/// Terminal outcome of one engine run.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// A call succeeded and its output parsed.
    Success(T),
    /// All attempts exhausted; carries the last failure reason.
    Failed(String),
    /// The job's scope was cancelled at a checkpoint; no further calls made.
    Cancelled,
}

/// The attempt engine. Borrows its collaborators for the duration of one job.
pub struct AttemptEngine<'a> {
    backend: &'a dyn CompletionBackend,
    registry: &'a CancellationRegistry,
    policy: AttemptPolicy,
}

impl<'a> AttemptEngine<'a> {
    pub fn new(
        backend: &'a dyn CompletionBackend,
        registry: &'a CancellationRegistry,
        policy: AttemptPolicy,
    ) -> Self {
        Self {
            backend,
            registry,
            policy,
        }
    }

    /// Drive attempts to a terminal outcome.
    ///
    /// `build_prompt` receives the corrective feedback text (empty on attempt
    /// 0) and returns the full prompt. `parse` turns raw model output into the
    /// typed result; its error becomes the next attempt's feedback.
    pub async fn run<T, P, F>(&self, scope: &str, build_prompt: P, parse: F) -> AttemptOutcome<T>
    where
        P: Fn(&str) -> String,
        F: Fn(&str) -> std::result::Result<T, String>,
    {
        let mut last_error: Option<String> = None;

        for attempt in 0..self.policy.max_attempts {
            if self.registry.is_cancelled(scope) {
                info!(scope, attempt, "Scope cancelled, aborting attempts");
                return AttemptOutcome::Cancelled;
            }

            let model = self.policy.model_for(attempt);
            if attempt == self.policy.escalation_index {
                info!(attempt, model, "Escalating to fallback model");
            }

            let feedback = match &last_error {
                Some(err) => {
                    debug!(attempt, error = %err, "Retrying with corrective feedback");
                    format!(
                        "PREVIOUS ATTEMPT FAILED. ERROR: {}. PLEASE FIX THE OUTPUT FORMAT.",
                        err
                    )
                }
                None => String::new(),
            };

            let prompt = build_prompt(&feedback);

            let failure = match self.backend.generate(&prompt, model).await {
                Ok(raw) => match parse(&raw) {
                    Ok(value) => return AttemptOutcome::Success(value),
                    Err(parse_error) => parse_error,
                },
                Err(e) => e.to_string(),
            };

            warn!(attempt, model, error = %failure, "Attempt failed");
            last_error = Some(failure);

            if attempt + 1 < self.policy.max_attempts {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        AttemptOutcome::Failed(
            last_error.unwrap_or_else(|| "no attempts were made".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_inference::MockCompletionBackend;

    fn policy(max_attempts: u32, escalation_index: u32) -> AttemptPolicy {
        AttemptPolicy {
            max_attempts,
            escalation_index,
            retry_delay: Duration::ZERO,
            default_model: "default-model".to_string(),
            fallback_model: "fallback-model".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let backend = MockCompletionBackend::new().then_ok("out");
        let registry = CancellationRegistry::new();
        let engine = AttemptEngine::new(&backend, &registry, policy(5, 3));

        let outcome = engine
            .run("scope", |f| format!("prompt {}", f), |raw| Ok(raw.to_string()))
            .await;

        assert!(matches!(outcome, AttemptOutcome::Success(ref s) if s == "out"));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_makes_exactly_max_attempts_calls() {
        let backend = MockCompletionBackend::new()
            .then_err("e1")
            .then_err("e2")
            .then_err("e3")
            .then_err("e4")
            .then_err("e5");
        let registry = CancellationRegistry::new();
        let engine = AttemptEngine::new(&backend, &registry, policy(5, 3));

        let outcome = engine
            .run("scope", |f| f.to_string(), |raw| Ok::<_, String>(raw.to_string()))
            .await;

        assert!(matches!(outcome, AttemptOutcome::Failed(ref e) if e == "Generation error: e5"));
        assert_eq!(backend.call_count(), 5);

        // Escalation at index 3 stays in effect for the remaining attempts.
        let models: Vec<String> = backend.calls().into_iter().map(|c| c.model).collect();
        assert_eq!(
            models,
            vec![
                "default-model",
                "default-model",
                "default-model",
                "fallback-model",
                "fallback-model"
            ]
        );
    }

    #[tokio::test]
    async fn test_two_failures_then_success_does_not_escalate() {
        let backend = MockCompletionBackend::new()
            .then_err("boom")
            .then_err("boom again")
            .then_ok("fine");
        let registry = CancellationRegistry::new();
        let engine = AttemptEngine::new(&backend, &registry, policy(5, 3));

        let outcome = engine
            .run("scope", |f| f.to_string(), |raw| Ok::<_, String>(raw.to_string()))
            .await;

        assert!(matches!(outcome, AttemptOutcome::Success(_)));
        assert_eq!(backend.call_count(), 3);
        assert!(backend.calls().iter().all(|c| c.model == "default-model"));
    }

    #[tokio::test]
    async fn test_cancelled_scope_makes_no_calls() {
        let backend = MockCompletionBackend::new();
        let registry = CancellationRegistry::new();
        registry.cancel("scope");
        let engine = AttemptEngine::new(&backend, &registry, policy(5, 3));

        let outcome = engine
            .run("scope", |f| f.to_string(), |raw| Ok::<_, String>(raw.to_string()))
            .await;

        assert!(matches!(outcome, AttemptOutcome::Cancelled));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_observed_between_attempts() {
        let backend = MockCompletionBackend::new().then_err("first fails");
        let registry = CancellationRegistry::new();
        let engine = AttemptEngine::new(&backend, &registry, policy(5, 3));

        // Cancel from inside the prompt builder: the first attempt is already
        // committed, the second must observe the registry.
        let reg = registry.clone();
        let outcome = engine
            .run(
                "scope",
                move |f| {
                    reg.cancel("scope");
                    f.to_string()
                },
                |raw| Ok::<_, String>(raw.to_string()),
            )
            .await;

        assert!(matches!(outcome, AttemptOutcome::Cancelled));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_feedback_embedded_from_second_attempt() {
        let backend = MockCompletionBackend::new().then_err("bad json").then_ok("ok");
        let registry = CancellationRegistry::new();
        let engine = AttemptEngine::new(&backend, &registry, policy(3, 2));

        let outcome = engine
            .run(
                "scope",
                |f| format!("PROMPT [{}]", f),
                |raw| Ok::<_, String>(raw.to_string()),
            )
            .await;

        assert!(matches!(outcome, AttemptOutcome::Success(_)));
        let calls = backend.calls();
        assert_eq!(calls[0].prompt, "PROMPT []");
        assert!(calls[1].prompt.contains("PREVIOUS ATTEMPT FAILED"));
        assert!(calls[1].prompt.contains("bad json"));
    }

    #[tokio::test]
    async fn test_parse_failure_retries_like_transport_failure() {
        let backend = MockCompletionBackend::new()
            .then_ok("not parseable")
            .then_ok("parseable");
        let registry = CancellationRegistry::new();
        let engine = AttemptEngine::new(&backend, &registry, policy(3, 2));

        let outcome = engine
            .run(
                "scope",
                |f| f.to_string(),
                |raw| {
                    if raw == "parseable" {
                        Ok(raw.to_string())
                    } else {
                        Err("wrong shape".to_string())
                    }
                },
            )
            .await;

        assert!(matches!(outcome, AttemptOutcome::Success(_)));
        assert_eq!(backend.call_count(), 2);
        assert!(backend.calls()[1].prompt.contains("wrong shape"));
    }
}
