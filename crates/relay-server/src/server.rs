//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use relay_telemetry::Metrics;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::state::RelayState;
use crate::types::{HealthResponse, PriceUpdateMessage};

/// Close reason sent to subscribers when the process stops.
pub const SHUTDOWN_REASON: &str = "Server shutting down";

/// Caps concurrent subscriber connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot, released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    relay: RelayState,
    limiter: Arc<ConnectionLimiter>,
}

impl AppState {
    pub fn new(relay: RelayState, config: &ServerConfig) -> Self {
        Self {
            relay,
            limiter: Arc::new(ConnectionLimiter::new(config.max_subscribers)),
        }
    }
}

/// Create the axum router.
///
/// Subscribers may upgrade on `/` or `/ws`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/api/health", get(get_health))
        .route("/api/snapshot", get(get_snapshot))
        .route("/metrics", get(get_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.relay.health())
}

async fn get_snapshot(State(state): State<AppState>) -> Json<PriceUpdateMessage> {
    Json(state.relay.price_update())
}

async fn get_metrics() -> Response {
    match Metrics::render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.limiter.try_acquire() else {
        warn!(
            current = state.limiter.current_count(),
            max = state.limiter.max(),
            "Subscriber limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.on_upgrade(move |socket| async move {
        handle_subscriber(socket, state.relay).await;
        drop(guard);
    })
}

/// Drive one subscriber connection until it closes or the server stops.
async fn handle_subscriber(socket: WebSocket, relay: RelayState) {
    let registry = relay.registry().clone();
    let shutdown = relay.shutdown_token().clone();
    let (id, mut queue) = registry.register();
    let (mut sender, mut receiver) = socket.split();

    info!(subscriber = id, total = registry.len(), "Subscriber connected");

    // Fast first paint; nothing to send before the first tick.
    if let Some(json) = join_snapshot(&relay, &mut queue) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            debug!(subscriber = id, "Failed to send initial snapshot, client disconnected");
            registry.remove(id);
            return;
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: Utf8Bytes::from(SHUTDOWN_REASON),
                };
                if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                    debug!(subscriber = id, error = %e, "Close frame not delivered");
                }
                break;
            }
            queued = queue.recv() => match queued {
                Some(payload) => {
                    if sender.send(Message::Text(Utf8Bytes::from(&*payload))).await.is_err() {
                        debug!(subscriber = id, "Send failed, client disconnected");
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    debug!(subscriber = id, "Client closed connection");
                    break;
                }
                Some(Err(e)) => {
                    debug!(subscriber = id, error = %e, "WebSocket receive error");
                    break;
                }
                // Pings are answered by axum; other client messages are ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    registry.remove(id);
    info!(subscriber = id, total = registry.len(), "Subscriber disconnected");
}

/// Serialize the join snapshot, or `None` while the cache is empty.
///
/// Anything a flush queued between registration and now is older than the
/// snapshot and is discarded, so the subscriber never steps back in time.
fn join_snapshot(relay: &RelayState, queue: &mut mpsc::Receiver<Arc<str>>) -> Option<String> {
    if relay.cache().is_empty() {
        return None;
    }
    let json = match serde_json::to_string(&relay.price_update()) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize initial snapshot");
            return None;
        }
    };
    while queue.try_recv().is_ok() {}
    Some(json)
}

/// Bind the subscriber-facing listener on all interfaces.
pub async fn bind(config: &ServerConfig) -> ServerResult<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve until the relay's shutdown token is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> ServerResult<()> {
    let shutdown = state.relay.shutdown_token().clone();
    let addr = listener.local_addr()?;
    let app = create_router(state);

    info!(%addr, "Subscriber server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        error!(error = %e, "Subscriber server failed");
        return Err(e.into());
    }

    info!("Subscriber server stopped");
    Ok(())
}
