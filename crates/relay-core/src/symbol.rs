//! Static symbol metadata.
//!
//! The universe of tracked instruments is loaded once at startup and never
//! changes. Its order defines the order of every outbound snapshot.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Suffix of the per-symbol ticker stream name on the upstream feed.
pub const TICKER_STREAM_SUFFIX: &str = "@ticker";

/// Metadata for one tracked instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    /// Upstream stream identifier (e.g., "btcusdt").
    pub stream_id: String,
    /// Display symbol (e.g., "BTC").
    pub symbol: String,
    /// Display name (e.g., "Bitcoin").
    pub name: String,
}

impl SymbolMeta {
    pub fn new(
        stream_id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// Ticker stream name for the combined-stream subscription.
    pub fn stream_name(&self) -> String {
        format!("{}{}", self.stream_id, TICKER_STREAM_SUFFIX)
    }
}

/// Ordered, immutable set of tracked instruments with lookup by stream id.
#[derive(Debug, Clone)]
pub struct SymbolUniverse {
    symbols: Vec<SymbolMeta>,
    index: HashMap<String, usize>,
}

impl SymbolUniverse {
    /// Build a universe, rejecting empty lists, blank ids and duplicates.
    ///
    /// Stream ids are matched case-sensitively against the upstream feed,
    /// which always reports them lowercase, so uppercase ids are rejected.
    pub fn new(symbols: Vec<SymbolMeta>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(CoreError::EmptyUniverse);
        }

        let mut index = HashMap::with_capacity(symbols.len());
        for (i, meta) in symbols.iter().enumerate() {
            if meta.stream_id.trim().is_empty() || meta.symbol.trim().is_empty() {
                return Err(CoreError::InvalidSymbol(format!("{meta:?}")));
            }
            if meta.stream_id.contains(['@', '/', '?'])
                || meta.stream_id.chars().any(char::is_uppercase)
            {
                return Err(CoreError::InvalidSymbol(meta.stream_id.clone()));
            }
            if index.insert(meta.stream_id.clone(), i).is_some() {
                return Err(CoreError::DuplicateStreamId(meta.stream_id.clone()));
            }
        }

        Ok(Self { symbols, index })
    }

    /// The default tracked pairs (all quoted in USDT).
    pub fn default_symbols() -> Vec<SymbolMeta> {
        vec![
            SymbolMeta::new("btcusdt", "BTC", "Bitcoin"),
            SymbolMeta::new("ethusdt", "ETH", "Ethereum"),
            SymbolMeta::new("solusdt", "SOL", "Solana"),
            SymbolMeta::new("bnbusdt", "BNB", "BNB"),
            SymbolMeta::new("xrpusdt", "XRP", "XRP"),
            SymbolMeta::new("dogeusdt", "DOGE", "Dogecoin"),
            SymbolMeta::new("adausdt", "ADA", "Cardano"),
        ]
    }

    /// Look up metadata by upstream stream id.
    pub fn get(&self, stream_id: &str) -> Option<&SymbolMeta> {
        self.index.get(stream_id).map(|&i| &self.symbols[i])
    }

    pub fn contains(&self, stream_id: &str) -> bool {
        self.index.contains_key(stream_id)
    }

    /// Symbols in static order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolMeta> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Build the combined-stream URL: `<base>?streams=a@ticker/b@ticker/...`.
    pub fn combined_stream_url(&self, base: &str) -> String {
        let streams = self
            .symbols
            .iter()
            .map(SymbolMeta::stream_name)
            .collect::<Vec<_>>()
            .join("/");
        format!("{}?streams={}", base.trim_end_matches('/'), streams)
    }
}
