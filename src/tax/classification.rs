use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

use super::matching::RealizedEvent;
use super::summary::TaxSummary;
use crate::db::{Transaction, TransactionKind};
use crate::error::TaxError;

/// Holding period above which a gain is long-term.
///
/// Fixed at 365 days regardless of leap years.
pub const LONG_TERM_THRESHOLD_DAYS: i64 = 365;

/// Holding-period classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Term {
    ShortTerm,
    LongTerm,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::ShortTerm => "SHORT",
            Term::LongTerm => "LONG",
        }
    }
}

/// Long-term only when held strictly more than 365 days
pub fn classify_term(open_date: NaiveDate, close_date: NaiveDate) -> Term {
    if (close_date - open_date).num_days() > LONG_TERM_THRESHOLD_DAYS {
        Term::LongTerm
    } else {
        Term::ShortTerm
    }
}

/// Running totals for one tax year
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearTotals {
    pub short_term_proceeds: Decimal,
    pub short_term_cost_basis: Decimal,
    pub short_term_gain_loss: Decimal,
    pub long_term_proceeds: Decimal,
    pub long_term_cost_basis: Decimal,
    pub long_term_gain_loss: Decimal,
    pub dividend_income: Decimal,
    pub interest_income: Decimal,
    pub realized_count: usize,
}

/// Folds realized events and income records into per-year totals
///
/// Only the years given at construction are tracked; anything dated outside
/// them is ignored, which is how carry-in sales from earlier years are kept
/// out of the summaries.
#[derive(Debug)]
pub struct Aggregator {
    years: BTreeMap<i32, YearTotals>,
}

impl Aggregator {
    pub fn new(tax_years: &[i32]) -> Self {
        Self {
            years: tax_years.iter().map(|&y| (y, YearTotals::default())).collect(),
        }
    }

    /// Add a realized event to the year of its close date
    pub fn record_realized(&mut self, event: &RealizedEvent) {
        let Some(totals) = self.years.get_mut(&event.close_date.year()) else {
            return;
        };

        match event.term {
            Term::ShortTerm => {
                totals.short_term_proceeds += event.proceeds;
                totals.short_term_cost_basis += event.cost_basis;
                totals.short_term_gain_loss += event.gain_loss;
            }
            Term::LongTerm => {
                totals.long_term_proceeds += event.proceeds;
                totals.long_term_cost_basis += event.cost_basis;
                totals.long_term_gain_loss += event.gain_loss;
            }
        }
        totals.realized_count += 1;
    }

    /// Add a dividend or interest record to the year of its date
    pub fn record_income(&mut self, tx: &Transaction) -> Result<(), TaxError> {
        tx.validate()?;
        if tx.kind.is_trade() {
            return Err(tx.invalid("trades must go through lot matching"));
        }
        let Some(totals) = self.years.get_mut(&tx.date.year()) else {
            return Ok(());
        };

        trace!(symbol = %tx.symbol, kind = tx.kind.as_str(), amount = %tx.amount, "Income");
        match tx.kind {
            TransactionKind::Dividend => totals.dividend_income += tx.amount,
            _ => totals.interest_income += tx.amount,
        }
        Ok(())
    }

    pub fn totals(&self, year: i32) -> Option<&YearTotals> {
        self.years.get(&year)
    }

    /// One summary per tracked year, in ascending year order
    pub fn finish(self) -> Vec<TaxSummary> {
        self.years
            .into_iter()
            .map(|(year, totals)| TaxSummary::assemble(year, &totals))
            .collect()
    }
}
