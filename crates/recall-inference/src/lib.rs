//! # recall-inference
//!
//! Completion service gateway for the recall worker fleet.
//!
//! Provides the Gemini backend used in production and a deterministic mock
//! backend for tests. Both implement [`recall_core::CompletionBackend`]; the
//! client is constructed explicitly and injected into the job attempt engine,
//! never held in process-global state.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiBackend;
pub use mock::MockCompletionBackend;
