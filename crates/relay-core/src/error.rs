//! Error types for relay-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Duplicate stream id: {0}")]
    DuplicateStreamId(String),

    #[error("Empty symbol universe")]
    EmptyUniverse,

    #[error("Invalid rate: {0}")]
    InvalidRate(f64),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
