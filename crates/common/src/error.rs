//! Error types for Keepsake.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeepsakeError {
    /// A required credential or setting is missing. Raised before any item is touched.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The relevance or description service failed or timed out.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// An oracle response carried no usable score.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KeepsakeError>;
