//! Seams between the worker core and its collaborators.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability: the completion
//! service, the document text source, and the result publish path are all
//! injected rather than ambient.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{FileRef, ResultMessage};

/// Text-completion provider invoked by the job attempt engine.
///
/// `generate` returns the emitted text or an error; a safety-blocked or empty
/// response is an error, never a sentinel string the caller has to sniff.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}

/// Document text source for extraction jobs.
///
/// Fetching and format-specific parsing (PDF etc.) live behind this seam; the
/// worker only needs the extracted plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, file: &FileRef) -> Result<String>;
}

/// Publish path for job outcomes.
///
/// Implementations must only return `Ok` once the message is safely handed to
/// the broker; the consumer loop withholds acknowledgment on `Err`.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, routing_key: &str, message: &ResultMessage) -> Result<()>;
}
