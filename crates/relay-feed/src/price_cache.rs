//! Per-symbol price cache.
//!
//! Holds the latest complete `Tick` for every tracked symbol that has been
//! observed since start. Written by the feed ingestor, read by the
//! broadcaster and the HTTP endpoints.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use relay_core::{PriceEntry, SymbolUniverse, Tick, TickUpdate};
use std::sync::Arc;
use tracing::trace;

/// Latest tick per tracked symbol.
#[derive(Debug)]
pub struct PriceCache {
    universe: Arc<SymbolUniverse>,
    ticks: DashMap<String, Tick>,
    /// Wall-clock time of the last successful write.
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl PriceCache {
    pub fn new(universe: Arc<SymbolUniverse>) -> Self {
        Self {
            universe,
            ticks: DashMap::new(),
            last_update: RwLock::new(None),
        }
    }

    /// Overwrite the tick for a tracked symbol.
    ///
    /// Returns `false` (and stores nothing) for symbols outside the universe.
    pub fn set(&self, stream_id: &str, tick: Tick) -> bool {
        if !self.universe.contains(stream_id) {
            return false;
        }
        self.ticks.insert(stream_id.to_string(), tick);
        self.touch();
        true
    }

    /// Merge a decoded update into the cache.
    ///
    /// Returns the stored tick, or `None` when the update was for an unknown
    /// symbol or could not produce a complete tick.
    pub fn apply(&self, update: &TickUpdate) -> Option<Tick> {
        if !self.universe.contains(&update.stream_id) {
            return None;
        }

        let merged = match self.ticks.entry(update.stream_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let merged = Tick::merge(Some(occupied.get()), update)?;
                occupied.insert(merged);
                merged
            }
            Entry::Vacant(vacant) => {
                let merged = Tick::merge(None, update)?;
                vacant.insert(merged);
                merged
            }
        };

        self.touch();
        trace!(stream_id = %update.stream_id, price = merged.last_price, "Tick cached");
        Some(merged)
    }

    pub fn get(&self, stream_id: &str) -> Option<Tick> {
        self.ticks.get(stream_id).map(|t| *t)
    }

    /// Number of symbols with cached data.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.read()
    }

    pub fn universe(&self) -> &Arc<SymbolUniverse> {
        &self.universe
    }

    /// One record per tracked symbol in static order, converted with `rate`.
    ///
    /// Symbols never observed get a placeholder with every price field null.
    pub fn snapshot(&self, rate: f64) -> Vec<PriceEntry> {
        self.universe
            .iter()
            .map(|meta| match self.ticks.get(&meta.stream_id) {
                Some(tick) => PriceEntry::from_tick(meta, &tick, rate),
                None => PriceEntry::placeholder(meta),
            })
            .collect()
    }

    fn touch(&self) {
        *self.last_update.write() = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::SymbolMeta;

    fn cache() -> PriceCache {
        let universe = SymbolUniverse::new(vec![
            SymbolMeta::new("btcusdt", "BTC", "Bitcoin"),
            SymbolMeta::new("ethusdt", "ETH", "Ethereum"),
        ])
        .unwrap();
        PriceCache::new(Arc::new(universe))
    }

    fn tick(price: f64) -> Tick {
        Tick {
            last_price: price,
            change_24h_pct: 2.5,
            high_24h: price * 1.02,
            low_24h: price * 0.98,
            volume_24h: 1_000_000.0,
        }
    }

    #[test]
    fn test_empty_snapshot_has_placeholders() {
        let cache = cache();
        assert!(cache.is_empty());
        assert!(cache.last_update().is_none());

        let snapshot = cache.snapshot(80.0);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].symbol, "BTC");
        assert_eq!(snapshot[1].symbol, "ETH");
        assert!(snapshot.iter().all(|e| !e.has_data()));
    }

    #[test]
    fn test_snapshot_converts_and_keeps_order() {
        let cache = cache();
        assert!(cache.set("ethusdt", tick(3000.0)));
        assert!(cache.set("btcusdt", tick(50000.0)));

        let snapshot = cache.snapshot(80.0);
        assert_eq!(snapshot[0].id, "btcusdt");
        assert_eq!(snapshot[0].price_usd, Some(50000.0));
        assert_eq!(snapshot[0].price_inr, Some(4_000_000.0));
        assert_eq!(snapshot[1].id, "ethusdt");
        assert_eq!(snapshot[1].price_inr, Some(240_000.0));
        assert!(cache.last_update().is_some());
    }

    #[test]
    fn test_unknown_symbol_not_stored() {
        let cache = cache();
        assert!(!cache.set("dogeusdt", tick(0.1)));
        assert!(cache
            .apply(&TickUpdate::from(("dogeusdt", tick(0.1))))
            .is_none());
        assert!(cache.is_empty());
        assert!(cache.snapshot(80.0).iter().all(|e| e.id != "dogeusdt"));
    }

    #[test]
    fn test_apply_partial_update() {
        let cache = cache();
        let mut partial = TickUpdate::from(("btcusdt", tick(50000.0)));
        partial.high_24h = None;

        // No previous tick to fill the gap from.
        assert!(cache.apply(&partial).is_none());
        assert!(cache.get("btcusdt").is_none());

        cache.set("btcusdt", tick(49000.0));
        let stored = cache.apply(&partial).unwrap();
        assert_eq!(stored.last_price, 50000.0);
        assert_eq!(stored.high_24h, 49000.0 * 1.02);
        assert_eq!(cache.get("btcusdt"), Some(stored));
    }

    #[test]
    fn test_latest_write_wins() {
        let cache = cache();
        cache.apply(&TickUpdate::from(("btcusdt", tick(50000.0))));
        cache.apply(&TickUpdate::from(("btcusdt", tick(50500.0))));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.snapshot(1.0)[0].price_usd, Some(50500.0));
    }
}
