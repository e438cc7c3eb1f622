//! Combined-stream ticker frame parsing.
//!
//! Frame format:
//! `{"stream": "btcusdt@ticker", "data": {"c": "50000.1", "P": "2.5", "h": ..., "l": ..., "q": ...}}`
//!
//! The exchange sends numbers as strings. A field that is present but does
//! not parse to a finite number is reported as `None` so the cache can keep
//! its previous value; a field that is absent makes the frame malformed.

use crate::error::{FeedError, FeedResult};
use relay_core::{SymbolUniverse, TickUpdate};
use serde::Deserialize;
use serde_json::Value;

/// Envelope of a combined-stream frame. Both fields are optional on the wire
/// (subscription acks and error replies carry neither).
#[derive(Debug, Deserialize)]
struct CombinedFrame {
    #[serde(default)]
    stream: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// 24h ticker payload keys used by the relay.
const LAST_PRICE: &str = "c";
const CHANGE_PCT: &str = "P";
const HIGH: &str = "h";
const LOW: &str = "l";
/// Quote asset volume.
const QUOTE_VOLUME: &str = "q";

/// Result of decoding one frame that was valid JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Ticker update for a tracked symbol.
    Update(TickUpdate),
    /// Frame without `stream` or `data`.
    NotTicker,
    /// Symbol not in the static universe.
    UnknownSymbol(String),
}

/// Decode one text frame.
///
/// Errors only for malformed payloads (bad JSON, non-object data, missing
/// required fields).
pub fn parse_frame(text: &str, universe: &SymbolUniverse) -> FeedResult<FrameOutcome> {
    let frame: CombinedFrame = serde_json::from_str(text)?;

    let (stream, data) = match (frame.stream, frame.data) {
        (Some(stream), Some(data)) => (stream, data),
        _ => return Ok(FrameOutcome::NotTicker),
    };

    let stream_id = stream.split('@').next().unwrap_or_default();
    if !universe.contains(stream_id) {
        return Ok(FrameOutcome::UnknownSymbol(stream_id.to_string()));
    }

    let Value::Object(ticker) = data else {
        return Err(FeedError::InvalidData(format!(
            "ticker data for {stream_id} is not an object"
        )));
    };

    let required = |key: &'static str| -> FeedResult<Option<f64>> {
        ticker
            .get(key)
            .map(parse_number)
            .ok_or(FeedError::MissingField(key))
    };

    Ok(FrameOutcome::Update(TickUpdate {
        stream_id: stream_id.to_string(),
        last_price: required(LAST_PRICE)?,
        change_24h_pct: required(CHANGE_PCT)?,
        high_24h: required(HIGH)?,
        low_24h: required(LOW)?,
        volume_24h: required(QUOTE_VOLUME)?,
    }))
}

/// Parse a string or JSON number into a finite f64.
fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
