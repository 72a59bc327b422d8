// Tax module - FIFO lot matching, holding-period classification, yearly summaries

pub mod classification;
pub mod ledger;
pub mod matching;
pub mod report;
pub mod summary;

use anyhow::Result;
use chrono::NaiveDate;

use crate::db::Transaction;

pub use classification::{classify_term, Aggregator, Term, LONG_TERM_THRESHOLD_DAYS};
pub use ledger::{Lot, LotId, LotLedger};
pub use matching::{FifoMatcher, RealizedEvent};
pub use report::{compute_open_lots, compute_tax_report, generate_tax_report, load_open_lots, TaxReport};
pub use summary::TaxSummary;

/// Filter for loading transaction records from a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub symbol: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TransactionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }

    /// Restrict to records dated on or before `to`
    pub fn through(mut self, to: NaiveDate) -> Self {
        self.to = Some(to);
        self
    }

    /// Restrict to records dated within `from..=to`
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    fn matches(&self, tx: &Transaction) -> bool {
        self.symbol.as_deref().map_or(true, |s| s == tx.symbol)
            && self.from.map_or(true, |from| tx.date >= from)
            && self.to.map_or(true, |to| tx.date <= to)
    }
}

/// Source of normalized transaction records
///
/// Implementations must return records ordered by date ascending, keeping the
/// original export order for records sharing a date.
pub trait TransactionStore {
    fn query_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;
}

/// In-memory store over records already held by the caller
impl TransactionStore for [Transaction] {
    fn query_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let mut selected: Vec<Transaction> =
            self.iter().filter(|tx| query.matches(tx)).cloned().collect();
        // Stable: same-day records keep their slice order
        selected.sort_by_key(|tx| tx.date);
        Ok(selected)
    }
}
