//! Rate source error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FxError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error(transparent)]
    InvalidRate(#[from] relay_core::CoreError),
}

pub type FxResult<T> = Result<T, FxError>;
