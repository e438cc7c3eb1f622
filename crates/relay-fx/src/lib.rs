//! Conversion rate source.
//!
//! Fetches a single USD→quote rate over HTTP, keeps the last good value and
//! publishes every successful refresh on a `watch` channel.

pub mod error;
pub mod source;

pub use error::{FxError, FxResult};
pub use source::{RateSource, RateSourceConfig};
