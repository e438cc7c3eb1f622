//! Upstream frame ingestion.
//!
//! `TickIngestor` is the single writer of the `PriceCache`: it decodes each
//! text frame, merges the update into the cache and wakes the broadcaster.

use crate::parser::{parse_frame, FrameOutcome};
use crate::price_cache::PriceCache;
use relay_core::UpdateSignal;
use relay_telemetry::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored in the cache; broadcaster signalled.
    Applied,
    /// Valid JSON without a ticker envelope (subscription ack etc).
    Ignored,
    /// Ticker for a symbol outside the universe.
    Unknown,
    /// Every field was known but the update could not form a complete tick.
    Dropped,
    /// Invalid JSON, wrong shape or missing fields.
    Malformed,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Ignored => "ignored",
            Self::Unknown => "unknown",
            Self::Dropped => "dropped",
            Self::Malformed => "malformed",
        }
    }
}

/// Frame counters since start.
#[derive(Debug, Default)]
pub struct IngestStats {
    applied: AtomicU64,
    ignored: AtomicU64,
    unknown: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
}

impl IngestStats {
    fn record(&self, outcome: IngestOutcome) {
        let counter = match outcome {
            IngestOutcome::Applied => &self.applied,
            IngestOutcome::Ignored => &self.ignored,
            IngestOutcome::Unknown => &self.unknown,
            IngestOutcome::Dropped => &self.dropped,
            IngestOutcome::Malformed => &self.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub fn unknown(&self) -> u64 {
        self.unknown.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Decodes upstream frames into the cache.
pub struct TickIngestor {
    cache: Arc<PriceCache>,
    signal: UpdateSignal,
    stats: IngestStats,
}

impl TickIngestor {
    pub fn new(cache: Arc<PriceCache>, signal: UpdateSignal) -> Self {
        Self {
            cache,
            signal,
            stats: IngestStats::default(),
        }
    }

    /// Process one text frame. Never fails; problems are logged and counted.
    pub fn handle_text(&self, text: &str) -> IngestOutcome {
        let outcome = match parse_frame(text, self.cache.universe()) {
            Ok(FrameOutcome::Update(update)) => match self.cache.apply(&update) {
                Some(_) => {
                    self.signal.mark_dirty();
                    IngestOutcome::Applied
                }
                None => {
                    debug!(
                        stream_id = %update.stream_id,
                        "Incomplete first tick dropped"
                    );
                    IngestOutcome::Dropped
                }
            },
            Ok(FrameOutcome::NotTicker) => {
                trace!("Non-ticker frame ignored");
                IngestOutcome::Ignored
            }
            Ok(FrameOutcome::UnknownSymbol(stream_id)) => {
                trace!(stream_id = %stream_id, "Unknown symbol ignored");
                IngestOutcome::Unknown
            }
            Err(e) => {
                warn!(error = %e, len = text.len(), "Malformed upstream frame dropped");
                IngestOutcome::Malformed
            }
        };

        self.stats.record(outcome);
        Metrics::frame(outcome.as_str());
        outcome
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }
}
