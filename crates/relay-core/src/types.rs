//! Market data types.
//!
//! `Tick` is the cached per-symbol state in native currency. `TickUpdate` is
//! what one decoded upstream frame carries; individual fields may be missing
//! when they failed to parse. `PriceEntry` is the outbound per-symbol record.

use crate::error::{CoreError, Result};
use crate::symbol::SymbolMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest observed market data for one symbol, native currency.
///
/// Always fully populated: a symbol either has a complete `Tick` or none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub last_price: f64,
    /// Signed 24h change in percent.
    pub change_24h_pct: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    /// 24h quote volume.
    pub volume_24h: f64,
}

impl Tick {
    /// Merge a decoded update over the previous tick.
    ///
    /// Fields that failed to parse keep their previous value. Returns `None`
    /// when the result would be partial (no previous tick to fill gaps from).
    pub fn merge(previous: Option<&Tick>, update: &TickUpdate) -> Option<Tick> {
        let pick = |new: Option<f64>, old: Option<f64>| new.or(old);
        Some(Tick {
            last_price: pick(update.last_price, previous.map(|t| t.last_price))?,
            change_24h_pct: pick(update.change_24h_pct, previous.map(|t| t.change_24h_pct))?,
            high_24h: pick(update.high_24h, previous.map(|t| t.high_24h))?,
            low_24h: pick(update.low_24h, previous.map(|t| t.low_24h))?,
            volume_24h: pick(update.volume_24h, previous.map(|t| t.volume_24h))?,
        })
    }
}

/// One decoded ticker event for a known symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct TickUpdate {
    pub stream_id: String,
    pub last_price: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub volume_24h: Option<f64>,
}

impl TickUpdate {
    /// True when every field parsed.
    pub fn is_complete(&self) -> bool {
        self.last_price.is_some()
            && self.change_24h_pct.is_some()
            && self.high_24h.is_some()
            && self.low_24h.is_some()
            && self.volume_24h.is_some()
    }
}

impl From<(&str, Tick)> for TickUpdate {
    fn from((stream_id, tick): (&str, Tick)) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            last_price: Some(tick.last_price),
            change_24h_pct: Some(tick.change_24h_pct),
            high_24h: Some(tick.high_24h),
            low_24h: Some(tick.low_24h),
            volume_24h: Some(tick.volume_24h),
        }
    }
}

/// Conversion rate from native into quote currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    /// Always finite and > 0.
    value: f64,
    /// `None` until the first successful fetch.
    last_updated: Option<DateTime<Utc>>,
}

impl Rate {
    /// Hardcoded fallback used before the first successful fetch.
    pub fn fallback(value: f64) -> Result<Self> {
        Self::validate(value)?;
        Ok(Self {
            value,
            last_updated: None,
        })
    }

    /// A freshly fetched rate.
    pub fn fetched(value: f64, at: DateTime<Utc>) -> Result<Self> {
        Self::validate(value)?;
        Ok(Self {
            value,
            last_updated: Some(at),
        })
    }

    pub fn validate(value: f64) -> Result<()> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(CoreError::InvalidRate(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }
}

/// Outbound per-symbol record.
///
/// Placeholders (symbol never observed) share this exact shape with every
/// price field `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price_usd: Option<f64>,
    pub price_inr: Option<f64>,
    pub change_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub high_24h_inr: Option<f64>,
    pub low_24h_inr: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceEntry {
    /// "No data yet" record.
    pub fn placeholder(meta: &SymbolMeta) -> Self {
        Self {
            id: meta.stream_id.clone(),
            name: meta.name.clone(),
            symbol: meta.symbol.clone(),
            price_usd: None,
            price_inr: None,
            change_24h: None,
            high_24h: None,
            low_24h: None,
            high_24h_inr: None,
            low_24h_inr: None,
            volume: None,
        }
    }

    /// Cached tick merged with the conversion rate.
    pub fn from_tick(meta: &SymbolMeta, tick: &Tick, rate: f64) -> Self {
        Self {
            id: meta.stream_id.clone(),
            name: meta.name.clone(),
            symbol: meta.symbol.clone(),
            price_usd: Some(tick.last_price),
            price_inr: Some(tick.last_price * rate),
            change_24h: Some(tick.change_24h_pct),
            high_24h: Some(tick.high_24h),
            low_24h: Some(tick.low_24h),
            high_24h_inr: Some(tick.high_24h * rate),
            low_24h_inr: Some(tick.low_24h * rate),
            volume: Some(tick.volume_24h),
        }
    }

    pub fn has_data(&self) -> bool {
        self.price_usd.is_some()
    }
}
