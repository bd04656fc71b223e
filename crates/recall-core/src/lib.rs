//! # recall-core
//!
//! Core types, traits, and abstractions shared by the recall worker fleet.
//!
//! This crate provides the error type, the wire message model, the text
//! segmenter, and the seams (`CompletionBackend`, `TextExtractor`,
//! `ResultSink`) that the worker and inference crates plug into.

pub mod defaults;
pub mod error;
pub mod message;
pub mod segment;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use message::{
    AggregationRequest, ExtractionRequest, FileRef, Flashcard, FlashcardRequest, JobStatus,
    ResultMessage, SummaryRequest,
};
pub use segment::segment;
pub use traits::{CompletionBackend, ResultSink, TextExtractor};
