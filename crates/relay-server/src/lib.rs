//! relay-server - Subscriber-facing side of the ticker relay.
//!
//! ```text
//!  TickIngestor ──mark_dirty──▶ UpdateSignal ──▶ Broadcaster ◀── rate changes (watch)
//!                                                   │ at most one flush per interval
//!                                                   ▼
//!                                         SubscriberRegistry (bounded queue each)
//!                                                   │
//!  axum: GET / and /ws (upgrade), /api/health, /api/snapshot, /metrics
//! ```

pub mod broadcast;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod state;
pub mod types;

pub use broadcast::{BroadcastKind, Broadcaster};
pub use coalescer::Coalescer;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use registry::{SubscriberId, SubscriberRegistry};
pub use server::{bind, create_router, serve, AppState, ConnectionLimiter, SHUTDOWN_REASON};
pub use state::RelayState;
pub use types::{HealthResponse, PriceUpdateMessage, PRICE_UPDATE};
