//! Upstream WebSocket feed connection.
//!
//! Maintains one persistent streaming connection to the exchange:
//! - Explicit state machine (Disconnected, Connecting, Connected, ReconnectScheduled)
//! - Fixed-delay reconnect with at most one reconnect pending, optional capped backoff
//! - Ping/pong keepalive and idle-connection detection
//! - Clean Close frame on shutdown
//! - Text frames forwarded over an mpsc channel in receipt order

pub mod connection;
pub mod error;
pub mod heartbeat;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, ReconnectPolicy};
pub use error::{WsError, WsResult};
pub use heartbeat::HeartbeatMonitor;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any outbound TLS connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
