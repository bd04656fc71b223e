//! Text extraction worker: fetch a document's text and segment it.
//!
//! The only worker without completion calls. Fetching and format handling
//! live behind the [`TextExtractor`] seam; this worker segments the returned
//! plain text and publishes the chunk list.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use recall_core::message::ExtractionRequest;
use recall_core::{defaults, segment, Result, TextExtractor};

use crate::consumer::{JobOutcome, JobProcessor};

pub struct ExtractionWorker {
    extractor: Arc<dyn TextExtractor>,
    min_chunk_size: usize,
}

impl ExtractionWorker {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            extractor,
            min_chunk_size: defaults::MIN_CHUNK_SIZE,
        }
    }

    /// Override the minimum chunk size (tests).
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.min_chunk_size = min_chunk_size;
        self
    }
}

#[async_trait::async_trait]
impl JobProcessor for ExtractionWorker {
    fn queue(&self) -> &'static str {
        defaults::QUEUE_TEXT_EXTRACTION_JOB
    }

    fn result_routing_key(&self) -> &'static str {
        defaults::ROUTING_TEXT_EXTRACTION_RESULT
    }

    fn message_type(&self) -> &'static str {
        "text_extraction"
    }

    fn validate(&self, request: &JsonValue) -> Result<String> {
        Ok(ExtractionRequest::parse(request)?.scope())
    }

    async fn process(&self, request: &JsonValue) -> JobOutcome {
        let req = match ExtractionRequest::parse(request) {
            Ok(req) => req,
            Err(e) => return JobOutcome::Failed(json!({ "msg": e.to_string() })),
        };

        let started = Instant::now();

        let text = match self.extractor.extract(&req.file).await {
            Ok(text) => text,
            Err(e) => {
                error!(job_id = %req.job_id, url = %req.file.url, error = %e, "Text extraction failed");
                return JobOutcome::Failed(json!({ "msg": e.to_string() }));
            }
        };

        let chunks = match segment(&text, self.min_chunk_size) {
            Ok(chunks) => chunks,
            Err(e) => return JobOutcome::Failed(json!({ "msg": e.to_string() })),
        };

        let duration = started.elapsed().as_secs_f64();
        info!(
            job_id = %req.job_id,
            chunks = chunks.len(),
            duration_ms = (duration * 1000.0) as u64,
            "Text extraction complete"
        );

        JobOutcome::Success(json!({
            "chunks": chunks,
            "file_id": req.file.id,
            "duration": duration,
        }))
    }
}
