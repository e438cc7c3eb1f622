//! Shared read-side state for the broadcaster and the HTTP handlers.

use crate::registry::SubscriberRegistry;
use crate::types::{iso_millis, HealthResponse, PriceUpdateMessage};
use relay_core::Rate;
use relay_feed::PriceCache;
use relay_ws::ConnectionState;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Cheap to clone; every field is a shared handle.
#[derive(Clone)]
pub struct RelayState {
    cache: Arc<PriceCache>,
    rate: watch::Receiver<Rate>,
    upstream: watch::Receiver<ConnectionState>,
    registry: Arc<SubscriberRegistry>,
    shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(
        cache: Arc<PriceCache>,
        rate: watch::Receiver<Rate>,
        upstream: watch::Receiver<ConnectionState>,
        registry: Arc<SubscriberRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cache,
            rate,
            upstream,
            registry,
            shutdown,
        }
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn current_rate(&self) -> Rate {
        *self.rate.borrow()
    }

    /// A fresh receiver for rate changes.
    pub fn rate_receiver(&self) -> watch::Receiver<Rate> {
        self.rate.clone()
    }

    pub fn upstream_connected(&self) -> bool {
        *self.upstream.borrow() == ConnectionState::Connected
    }

    /// Cache contents merged with the current rate.
    pub fn price_update(&self) -> PriceUpdateMessage {
        let rate = self.current_rate().value();
        PriceUpdateMessage::new(self.cache.snapshot(rate), rate, self.cache.last_update())
    }

    pub fn health(&self) -> HealthResponse {
        let rate = self.current_rate();
        HealthResponse {
            status: "ok".to_string(),
            connected_clients: self.registry.len(),
            binance_connected: self.upstream_connected(),
            cached_symbols: self.cache.len(),
            inr_rate: rate.value(),
            inr_rate_last_updated: rate.last_updated().map(iso_millis),
            last_update_time: self.cache.last_update().map(iso_millis),
        }
    }
}
