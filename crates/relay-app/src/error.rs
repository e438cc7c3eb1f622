//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Symbol error: {0}")]
    Core(#[from] relay_core::CoreError),

    #[error("Upstream connection error: {0}")]
    Ws(#[from] relay_ws::WsError),

    #[error("Feed error: {0}")]
    Feed(#[from] relay_feed::FeedError),

    #[error("Rate source error: {0}")]
    Fx(#[from] relay_fx::FxError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] relay_telemetry::TelemetryError),

    #[error("Server error: {0}")]
    Server(#[from] relay_server::ServerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
