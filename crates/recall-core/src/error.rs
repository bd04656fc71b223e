//! Error types for the recall worker fleet.

use thiserror::Error;

/// Result type alias using recall's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for recall operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Job request failed schema validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Completion service client could not be constructed (e.g. missing credential)
    #[error("Client init error: {0}")]
    ClientInit(String),

    /// Completion call failed: transport error, safety block, or mis-shaped output
    #[error("Generation error: {0}")]
    Generation(String),

    /// Publishing a result message failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// Broker connection or channel failure
    #[error("Broker error: {0}")]
    Broker(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Generation(e.to_string())
    }
}

impl From<lapin::Error> for Error {
    fn from(e: lapin::Error) -> Self {
        Error::Broker(e.to_string())
    }
}
