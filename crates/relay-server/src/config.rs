//! Subscriber-facing server configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP/WebSocket server and broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on (all interfaces).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Minimum spacing between two scheduled broadcasts.
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
    /// Maximum concurrent subscriber connections.
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
    /// Outbound messages buffered per subscriber before skipping.
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_broadcast_interval_ms() -> u64 {
    1000
}

fn default_max_subscribers() -> usize {
    256
}

fn default_subscriber_queue() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            max_subscribers: default_max_subscribers(),
            subscriber_queue: default_subscriber_queue(),
        }
    }
}

impl ServerConfig {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }
}
