//! Wire types for the subscriber socket and the REST endpoints.

use chrono::{DateTime, SecondsFormat, Utc};
use relay_core::PriceEntry;
use serde::{Deserialize, Serialize};

/// Value of the `type` field on every price push.
pub const PRICE_UPDATE: &str = "price_update";

/// Full price push, sent on join, on every flush and by `/api/snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdateMessage {
    #[serde(rename = "type")]
    pub kind: String,
    /// One record per tracked symbol, static order.
    pub data: Vec<PriceEntry>,
    #[serde(rename = "inrRate")]
    pub inr_rate: f64,
    /// Last cache update, `null` before the first tick.
    pub timestamp: Option<String>,
}

impl PriceUpdateMessage {
    pub fn new(
        data: Vec<PriceEntry>,
        inr_rate: f64,
        last_update: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            kind: PRICE_UPDATE.to_string(),
            data,
            inr_rate,
            timestamp: last_update.map(iso_millis),
        }
    }
}

/// `GET /api/health` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub connected_clients: usize,
    pub binance_connected: bool,
    pub cached_symbols: usize,
    pub inr_rate: f64,
    pub inr_rate_last_updated: Option<String>,
    pub last_update_time: Option<String>,
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
