//! Centralized default constants for the recall worker fleet.
//!
//! **This module is the single source of truth** for all shared default
//! values. Worker binaries and tests reference these constants instead of
//! defining their own magic numbers.

// =============================================================================
// SEGMENTATION
// =============================================================================

/// Minimum bytes per text chunk produced by the segmenter.
pub const MIN_CHUNK_SIZE: usize = 1000;

/// Separator preference order for chunk boundaries. Earlier entries win when
/// both are found at-or-after the search start.
pub const CHUNK_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

// =============================================================================
// COMPLETION SERVICE
// =============================================================================

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

/// Fallback model used from the escalation attempt onward.
pub const FALLBACK_MODEL: &str = "gemini-2.0-flash";

/// Timeout for a single completion request (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// ATTEMPT POLICY
// =============================================================================

/// Attempts for single-chunk summary generation.
pub const SUMMARY_MAX_ATTEMPTS: u32 = 5;

/// Attempt index at which summary generation escalates to the fallback model.
pub const SUMMARY_ESCALATION_INDEX: u32 = 3;

/// Delay between failed summary attempts (seconds).
pub const SUMMARY_RETRY_DELAY_SECS: u64 = 5;

/// Attempts for flashcard generation and aggregation.
pub const STRUCTURED_MAX_ATTEMPTS: u32 = 3;

/// Attempt index at which structured jobs escalate to the fallback model.
pub const STRUCTURED_ESCALATION_INDEX: u32 = 2;

/// Delay between failed structured attempts (seconds).
pub const STRUCTURED_RETRY_DELAY_SECS: u64 = 2;

// =============================================================================
// BROKER TOPOLOGY
// =============================================================================

/// Exchange jobs are published to by the producer.
pub const EXCHANGE_WORKER_JOB: &str = "worker-job";

/// Exchange all worker results are published to.
pub const EXCHANGE_WORKER_RESULTS: &str = "worker-results";

/// Fanout exchange for cancellation broadcasts.
pub const EXCHANGE_WORKER_CANCELLATION: &str = "worker-cancellation";

pub const QUEUE_TEXT_EXTRACTION_JOB: &str = "worker.text.extraction.job";
pub const QUEUE_SUMMARY_GENERATION_JOB: &str = "worker.summary.generation.job";
pub const QUEUE_FLASHCARD_GENERATION_JOB: &str = "worker.flashcard.generation.job";
pub const QUEUE_AGGREGATION_JOB: &str = "worker.aggregation.job";

pub const ROUTING_TEXT_EXTRACTION_RESULT: &str = "worker.text.extraction.result";
pub const ROUTING_SUMMARY_GENERATION_RESULT: &str = "worker.summary.generation.result";
pub const ROUTING_FLASHCARD_GENERATION_RESULT: &str = "worker.flashcard.generation.result";
pub const ROUTING_AGGREGATION_RESULT: &str = "worker.aggregation.result";

// =============================================================================
// RECONNECTION
// =============================================================================

/// Delay before retrying a failed broker connection (seconds).
pub const RECONNECT_DELAY_SECS: u64 = 5;
