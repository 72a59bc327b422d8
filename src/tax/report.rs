use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use super::classification::Aggregator;
use super::ledger::Lot;
use super::matching::{FifoMatcher, RealizedEvent};
use super::summary::TaxSummary;
use super::{TransactionQuery, TransactionStore};
use crate::db::Transaction;
use crate::error::TaxError;

/// Output of one tax computation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxReport {
    /// One summary per requested year, ascending
    pub summaries: Vec<TaxSummary>,
    /// Realized events closed within the requested years, by symbol then date
    pub realized: Vec<RealizedEvent>,
}

impl TaxReport {
    pub fn summary(&self, year: i32) -> Option<&TaxSummary> {
        self.summaries.iter().find(|s| s.tax_year == year)
    }
}

/// Last calendar day the computation needs to look at
fn year_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

/// Group records by symbol (alphabetical), each group in stable date order
fn by_symbol<'a>(
    records: impl IntoIterator<Item = &'a Transaction>,
) -> Vec<(&'a str, Vec<&'a Transaction>)> {
    records
        .into_iter()
        .map(|tx| (tx.symbol.as_str(), tx))
        .into_group_map()
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
        .map(|(symbol, mut txs)| {
            txs.sort_by_key(|tx| tx.date);
            (symbol, txs)
        })
        .collect()
}

/// Compute tax summaries for `tax_years` from a complete record set
///
/// Records dated before the earliest requested year still open and consume
/// lots (carry-in) but do not contribute to any summary. The first error
/// aborts the whole run.
pub fn compute_tax_report(records: &[Transaction], tax_years: &[i32]) -> Result<TaxReport, TaxError> {
    let years: Vec<i32> = tax_years.iter().copied().sorted().dedup().collect();
    let mut aggregator = Aggregator::new(&years);
    let mut realized = Vec::new();

    let Some(cutoff) = years.last().copied().and_then(year_end) else {
        return Ok(TaxReport {
            summaries: aggregator.finish(),
            realized,
        });
    };

    for (symbol, txs) in by_symbol(records.iter().filter(|tx| tx.date <= cutoff)) {
        debug!("Processing {} records for {}", txs.len(), symbol);
        let mut matcher = FifoMatcher::new();

        for tx in txs {
            if !tx.kind.is_trade() {
                aggregator.record_income(tx)?;
                continue;
            }

            for event in matcher.process(tx)? {
                aggregator.record_realized(&event);
                if years.binary_search(&event.close_date.year()).is_ok() {
                    realized.push(event);
                }
            }
        }
    }

    let summaries = aggregator.finish();
    info!(
        "Computed {} tax summaries from {} realized events",
        summaries.len(),
        realized.len()
    );

    Ok(TaxReport {
        summaries,
        realized,
    })
}

/// Load records from the store and compute summaries for `tax_years`
pub fn generate_tax_report<S>(store: &S, tax_years: &[i32]) -> Result<TaxReport>
where
    S: TransactionStore + ?Sized,
{
    let Some(cutoff) = tax_years.iter().copied().max().and_then(year_end) else {
        return Ok(compute_tax_report(&[], tax_years)?);
    };

    info!("Loading transactions through {}", cutoff);
    let records = store
        .query_transactions(&TransactionQuery::all().through(cutoff))
        .context("Failed to load transactions")?;

    let report = compute_tax_report(&records, tax_years)
        .with_context(|| format!("Failed to compute tax summary for {:?}", tax_years))?;
    Ok(report)
}

/// Lots still open after processing every trade dated on or before `as_of`
pub fn compute_open_lots(records: &[Transaction], as_of: NaiveDate) -> Result<Vec<Lot>, TaxError> {
    let mut lots = Vec::new();

    for (_, txs) in by_symbol(records.iter().filter(|tx| tx.date <= as_of && tx.kind.is_trade())) {
        let mut matcher = FifoMatcher::new();
        for tx in txs {
            matcher.process(tx)?;
        }
        lots.extend(matcher.into_ledger().into_lots());
    }

    Ok(lots)
}

/// Load records from the store and compute the open lots as of a date
pub fn load_open_lots<S>(store: &S, as_of: NaiveDate) -> Result<Vec<Lot>>
where
    S: TransactionStore + ?Sized,
{
    let records = store
        .query_transactions(&TransactionQuery::all().through(as_of))
        .context("Failed to load transactions")?;

    let lots = compute_open_lots(&records, as_of)
        .with_context(|| format!("Failed to rebuild open lots as of {}", as_of))?;
    Ok(lots)
}
