//! Mock completion backend for deterministic testing.
//!
//! Plays back a scripted sequence of outcomes (one per `generate` call) and
//! records every call so tests can assert on attempt counts, model escalation,
//! and feedback embedding.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use recall_core::{CompletionBackend, Error, Result};

/// One recorded `generate` invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: String,
    pub model: String,
}

/// Scripted mock backend.
///
/// Outcomes queued with [`then_ok`](Self::then_ok) / [`then_err`](Self::then_err)
/// are consumed in order; once the script runs out, every further call returns
/// the default response.
#[derive(Clone, Default)]
pub struct MockCompletionBackend {
    script: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    default_response: String,
}

impl MockCompletionBackend {
    /// Create a mock whose unscripted calls return an empty-script default.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_log: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".to_string(),
        }
    }

    /// Set the response returned once the script is exhausted.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Queue a successful response.
    pub fn then_ok(self, response: impl Into<String>) -> Self {
        self.script.lock().unwrap().push_back(Ok(response.into()));
        self
    }

    /// Queue a generation failure.
    pub fn then_err(self, message: impl Into<String>) -> Self {
        self.script.lock().unwrap().push_back(Err(message.into()));
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of `generate` calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        self.call_log.lock().unwrap().push(MockCall {
            prompt: prompt.to_string(),
            model: model.to_string(),
        });

        match self.script.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(Error::Generation(message)),
            None => Ok(self.default_response.clone()),
        }
    }
}
