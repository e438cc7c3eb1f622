//! Ticker relay.
//!
//! Wires the components together:
//! - Upstream combined ticker stream (relay-ws) feeding the price cache (relay-feed)
//! - Conversion rate poller (relay-fx)
//! - Throttled broadcaster and subscriber server (relay-server)

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
