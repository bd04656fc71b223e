//! Wire message model: inbound job envelopes and the outbound result message.
//!
//! Inbound payloads are deserialized into one typed request struct per job
//! kind and validated once at the boundary; nothing downstream touches raw
//! JSON maps. The `job_id` correlation key is carried as a raw JSON value and
//! copied verbatim into results — producers send integers for some job kinds
//! and strings for others, and the key must never be rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Status reported in a [`ResultMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Error,
}

/// Outbound result envelope published to the results exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    /// Correlation key, copied verbatim from the job envelope.
    pub job_id: JsonValue,
    pub status: JobStatus,
    pub payload: JsonValue,
    pub timestamp: DateTime<Utc>,
}

impl ResultMessage {
    /// Build a success result with the given payload.
    pub fn success(
        message_type: impl Into<String>,
        job_id: JsonValue,
        payload: JsonValue,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            job_id,
            status: JobStatus::Success,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Build an error result whose payload carries a human-readable `msg`.
    pub fn error(message_type: impl Into<String>, job_id: JsonValue, msg: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            job_id,
            status: JobStatus::Error,
            payload: serde_json::json!({ "msg": msg.into() }),
            timestamp: Utc::now(),
        }
    }

    /// Serialize to the JSON wire representation.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A single question/answer flashcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Reference to an uploaded file handed to the extraction worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub id: JsonValue,
    pub url: String,
}

/// Render a scope identifier (category id) as the registry key.
///
/// Producers send numeric ids; the cancellation broadcast may carry them as
/// numbers or strings, so both sides normalize through this.
pub fn scope_key(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_request<T: serde::de::DeserializeOwned>(value: &JsonValue) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|e| Error::Validation(e.to_string()))
}

/// Request for the text extraction worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionRequest {
    pub job_id: JsonValue,
    pub category_item_id: JsonValue,
    pub file: FileRef,
}

impl ExtractionRequest {
    pub fn parse(value: &JsonValue) -> Result<Self> {
        let req: Self = parse_request(value)?;
        if req.file.url.is_empty() {
            return Err(Error::Validation("file.url must not be empty".into()));
        }
        Ok(req)
    }

    pub fn scope(&self) -> String {
        scope_key(&self.category_item_id)
    }
}

/// Request for the single-chunk summary worker.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub job_id: JsonValue,
    pub category_id: JsonValue,
    pub chunk_number: i64,
    pub text: String,
}

impl SummaryRequest {
    pub fn parse(value: &JsonValue) -> Result<Self> {
        let req: Self = parse_request(value)?;
        if req.text.is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
        Ok(req)
    }

    pub fn scope(&self) -> String {
        scope_key(&self.category_id)
    }
}

/// Request for the single-chunk flashcard worker.
#[derive(Debug, Clone, Deserialize)]
pub struct FlashcardRequest {
    pub job_id: JsonValue,
    pub category_id: JsonValue,
    pub summary_chunk_id: JsonValue,
    pub text: String,
}

impl FlashcardRequest {
    pub fn parse(value: &JsonValue) -> Result<Self> {
        let req: Self = parse_request(value)?;
        if req.text.is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
        Ok(req)
    }

    pub fn scope(&self) -> String {
        scope_key(&self.category_id)
    }
}

/// Request for the multi-chunk aggregation worker.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationRequest {
    pub job_id: JsonValue,
    pub category_item_id: JsonValue,
    pub summaries: Vec<String>,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
}

impl AggregationRequest {
    pub fn parse(value: &JsonValue) -> Result<Self> {
        let req: Self = parse_request(value)?;
        if req.summaries.is_empty() {
            return Err(Error::Validation("summaries must not be empty".into()));
        }
        Ok(req)
    }

    pub fn scope(&self) -> String {
        scope_key(&self.category_item_id)
    }
}
