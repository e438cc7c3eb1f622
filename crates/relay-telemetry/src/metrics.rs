//! Prometheus metrics for the ticker relay.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! (duplicate metric name) is a programming error that should crash at first
//! use rather than silently drop observability.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_int_gauge, CounterVec, Encoder, Gauge,
    IntGauge, TextEncoder,
};

/// Upstream connection state (1 = connected, 0 = disconnected).
pub static UPSTREAM_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "relay_upstream_connected",
        "Upstream feed connection state (1=connected)"
    )
    .unwrap()
});

/// Upstream reconnects by reason.
pub static UPSTREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_upstream_reconnect_total",
        "Total upstream reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Upstream frames by outcome (applied/unknown/dropped/malformed).
pub static FRAMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_frames_total",
        "Upstream frames processed by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Broadcasts by kind (scheduled/out_of_band).
pub static BROADCASTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_broadcasts_total",
        "Total broadcasts sent to subscribers",
        &["kind"]
    )
    .unwrap()
});

/// Subscribers reached by the most recent broadcast.
pub static BROADCAST_RECEIVERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "relay_broadcast_receivers",
        "Subscribers reached by the last broadcast"
    )
    .unwrap()
});

/// Currently connected subscribers.
pub static SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("relay_subscribers", "Connected subscribers").unwrap()
});

/// FX fetches by result (ok/error).
pub static FX_FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_fx_fetch_total",
        "FX rate fetch attempts by result",
        &["result"]
    )
    .unwrap()
});

/// Current conversion rate.
pub static FX_RATE: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("relay_fx_rate", "Current conversion rate").unwrap());

/// Static helpers so call sites stay one-liners.
pub struct Metrics;

impl Metrics {
    pub fn upstream_connected() {
        UPSTREAM_CONNECTED.set(1.0);
    }

    pub fn upstream_disconnected() {
        UPSTREAM_CONNECTED.set(0.0);
    }

    pub fn upstream_reconnect(reason: &str) {
        UPSTREAM_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record one processed upstream frame.
    pub fn frame(outcome: &str) {
        FRAMES_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a broadcast and how many subscribers it reached.
    pub fn broadcast(kind: &str, receivers: usize) {
        BROADCASTS_TOTAL.with_label_values(&[kind]).inc();
        BROADCAST_RECEIVERS.set(receivers as i64);
    }

    pub fn subscribers(count: usize) {
        SUBSCRIBERS.set(count as i64);
    }

    pub fn fx_fetch_ok(rate: f64) {
        FX_FETCH_TOTAL.with_label_values(&["ok"]).inc();
        FX_RATE.set(rate);
    }

    pub fn fx_fetch_error() {
        FX_FETCH_TOTAL.with_label_values(&["error"]).inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
