//! Upstream connection manager.
//!
//! Handles the connection lifecycle as an explicit state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> ReconnectScheduled -> Connecting -> ...
//! ```
//!
//! Every session end (remote close, read error, stream end, idle timeout,
//! failed connect) goes through the single reconnect branch of the run loop,
//! so at most one reconnect is ever pending no matter how many failure
//! events a single disconnect produces.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatMonitor;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use relay_telemetry::Metrics;
use std::borrow::Cow;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Close reason sent upstream on shutdown.
const SHUTDOWN_REASON: &str = "Server shutting down";

/// Delay between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Constant delay after every disconnect.
    Fixed { delay_ms: u64 },
    /// `base * 2^(attempt-1)`, capped at `max_ms`. Resets after a successful connect.
    Exponential { base_ms: u64, max_ms: u64 },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Self::Exponential { base_ms, max_ms } => {
                let exponent = attempt.saturating_sub(1).min(16);
                let delay = base_ms.saturating_mul(1u64 << exponent);
                Duration::from_millis(delay.min(max_ms))
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed { delay_ms: 5000 }
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Full WebSocket URL including the stream query.
    pub url: String,
    pub reconnect: ReconnectPolicy,
    /// Maximum consecutive failed sessions (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Timeout for TCP + TLS + WebSocket handshake.
    pub connect_timeout_ms: u64,
    /// Reconnect when nothing is received for this long (0 = disabled).
    pub idle_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect: ReconnectPolicy::default(),
            max_reconnect_attempts: 0, // Infinite
            connect_timeout_ms: 10_000,
            idle_timeout_ms: 60_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectScheduled,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ReconnectScheduled => "reconnect_scheduled",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a connected session ended without an error.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    StreamEnded,
}

/// Upstream WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    /// Consecutive failed sessions since the last successful connect.
    reconnect_count: RwLock<u32>,
    frame_tx: mpsc::Sender<String>,
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager. Text frames are forwarded to `frame_tx`.
    pub fn new(
        config: ConnectionConfig,
        frame_tx: mpsc::Sender<String>,
        shutdown_token: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            state_tx,
            reconnect_count: RwLock::new(0),
            frame_tx,
            shutdown_token,
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown: the open connection is closed with code 1000
    /// and any pending reconnect is abandoned.
    pub fn shutdown(&self) {
        info!("Upstream shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "Upstream state transition");
        }
        if next == ConnectionState::Connected {
            Metrics::upstream_connected();
        } else if prev == ConnectionState::Connected {
            Metrics::upstream_disconnected();
        }
    }

    /// Connect and keep reconnecting until shutdown.
    ///
    /// Returns `Ok(())` on shutdown, or an error once `max_reconnect_attempts`
    /// consecutive sessions have failed.
    pub async fn run(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            let reason = match self.try_connect().await {
                Ok(SessionEnd::Shutdown) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Ok(SessionEnd::StreamEnded) => {
                    warn!("Upstream stream ended");
                    "stream_ended"
                }
                Err(e) => {
                    warn!(error = %e, "Upstream connection lost");
                    e.reason()
                }
            };

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            let attempt = {
                let mut count = self.reconnect_count.write();
                *count += 1;
                *count
            };

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                self.set_state(ConnectionState::Disconnected);
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            self.set_state(ConnectionState::ReconnectScheduled);
            Metrics::upstream_reconnect(reason);

            let delay = self.config.reconnect.delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during reconnect delay, exiting");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<SessionEnd> {
        info!(url = %self.config.url, "Connecting to upstream");

        let connect = connect_async_tls_with_config(&self.config.url, None, true, None);
        let (ws_stream, _response) = tokio::select! {
            result = tokio::time::timeout(
                Duration::from_millis(self.config.connect_timeout_ms),
                connect,
            ) => result.map_err(|_| WsError::ConnectTimeout(self.config.connect_timeout_ms))??,
            () = self.shutdown_token.cancelled() => return Ok(SessionEnd::Shutdown),
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        *self.reconnect_count.write() = 0;
        info!("Upstream connected");

        let mut heartbeat = HeartbeatMonitor::new(self.config.idle_timeout_ms);
        heartbeat.reset();

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, closing upstream");
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: Cow::Borrowed(SHUTDOWN_REASON),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        warn!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(SessionEnd::Shutdown);
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            heartbeat.record_frame();
                            if self.frame_tx.send(text).await.is_err() {
                                warn!("Frame receiver dropped");
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            heartbeat.record_frame();
                            write.send(Message::Pong(data)).await?;
                            heartbeat.record_pong_sent();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1005, "No status".to_string()));
                            warn!(code, %reason, "Upstream closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {
                            heartbeat.record_frame();
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Upstream read error");
                            return Err(e.into());
                        }
                        None => return Ok(SessionEnd::StreamEnded),
                    }
                }

                () = tokio::time::sleep_until(heartbeat.deadline()), if heartbeat.enabled() => {
                    if heartbeat.is_idle() {
                        warn!(idle_timeout_ms = heartbeat.idle_timeout_ms(), "Upstream idle");
                        return Err(WsError::IdleTimeout(heartbeat.idle_timeout_ms()));
                    }
                }
            }
        }
    }
}
