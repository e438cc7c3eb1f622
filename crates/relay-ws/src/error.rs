//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Connect timed out after {0}ms")]
    ConnectTimeout(u64),

    #[error("No frames received for {0}ms")]
    IdleTimeout(u64),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

impl WsError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) | Self::ConnectTimeout(_) => "connect_failed",
            Self::ConnectionClosed { .. } => "remote_close",
            Self::IdleTimeout(_) => "idle_timeout",
            Self::Tungstenite(_) => "protocol_error",
        }
    }
}

pub type WsResult<T> = Result<T, WsError>;
