//! Core domain types for the ticker relay.
//!
//! This crate provides the types shared by every other relay crate:
//! - `SymbolMeta`, `SymbolUniverse`: the static set of tracked instruments
//! - `Tick`, `TickUpdate`: latest market data per symbol (native currency)
//! - `Rate`: the conversion factor into the quote currency
//! - `PriceEntry`: one per-symbol record of the outbound payload
//! - `UpdateSignal`: coalescing "new data available" notification

pub mod error;
pub mod signal;
pub mod symbol;
pub mod types;

pub use error::{CoreError, Result};
pub use signal::UpdateSignal;
pub use symbol::{SymbolMeta, SymbolUniverse};
pub use types::{PriceEntry, Rate, Tick, TickUpdate};
