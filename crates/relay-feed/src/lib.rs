//! Ticker feed ingestion.
//!
//! Decodes combined-stream ticker frames and keeps the latest tick per
//! tracked symbol in a `PriceCache`.

pub mod error;
pub mod ingest;
pub mod parser;
pub mod price_cache;

pub use error::{FeedError, FeedResult};
pub use ingest::{IngestOutcome, IngestStats, TickIngestor};
pub use parser::{parse_frame, FrameOutcome};
pub use price_cache::PriceCache;
