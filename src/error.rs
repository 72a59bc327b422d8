//! Error handling for the tax engine
//!
//! The lot ledger and matching engine report failures through [`TaxError`].
//! Outer layers (store, importer, CLI) use `anyhow` for context chaining and
//! wrap these errors when they propagate.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Core error types for lot matching and tax aggregation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxError {
    /// A sale asked for more units than the symbol's open lots hold.
    #[error(
        "oversold position in {symbol} on {date}: selling {requested} units but {unmatched} \
         had no matching purchase.\n\
         \nThis usually means the export is missing earlier Buy records (transfers in, \
         history older than the export window, or short sales, which are not supported).\n\
         \nTo fix: export the full trade history for {symbol} and import it again."
    )]
    OversoldPosition {
        symbol: String,
        date: NaiveDate,
        requested: Decimal,
        unmatched: Decimal,
    },

    /// Internal bookkeeping defect: a lot was asked to give up more than it holds.
    #[error("lot {lot} of {symbol} holds {remaining} units, cannot consume {requested}")]
    InsufficientLotQuantity {
        symbol: String,
        lot: u64,
        remaining: Decimal,
        requested: Decimal,
    },

    /// The symbol has no open lots left.
    #[error("no open lots for {0}")]
    NoOpenLots(String),

    /// A record carries values the engine refuses to coerce.
    #[error("invalid {kind} record for {symbol} on {date}: {reason}")]
    InvalidRecord {
        symbol: String,
        kind: &'static str,
        date: NaiveDate,
        reason: String,
    },
}

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;
