// Import module - brokerage activity exports into the transaction store

pub mod broker_csv;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::DateBasis;
use crate::db::{self, Transaction, TransactionKind};

pub use broker_csv::{ParsedExport, RawTransaction, SkippedRow};

/// Outcome of storing a batch of records
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub duplicates: usize,
}

/// Parse an export file and normalize every row
///
/// Returns the normalized records together with the rows that were skipped.
pub fn import_file<P: AsRef<Path>>(
    file_path: P,
    date_basis: DateBasis,
) -> Result<(Vec<Transaction>, Vec<SkippedRow>)> {
    let path = file_path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("File has no extension"))?
        .to_lowercase();

    info!("Importing brokerage file: {:?} (type: {})", path, extension);

    let parsed = match extension.as_str() {
        "csv" | "txt" => broker_csv::parse_broker_csv(path)?,
        _ => {
            return Err(anyhow!(
                "Unsupported file format: {}. Supported formats: .csv",
                extension
            ))
        }
    };

    let transactions = parsed
        .transactions
        .iter()
        .map(|raw| raw.to_transaction(date_basis))
        .collect::<Result<Vec<_>>>()?;

    Ok((transactions, parsed.skipped))
}

type RecordKey = (
    String,
    TransactionKind,
    chrono::NaiveDate,
    Option<Decimal>,
    Option<Decimal>,
    Decimal,
);

fn record_key(tx: &Transaction) -> RecordKey {
    (
        tx.symbol.clone(),
        tx.kind,
        tx.date,
        tx.quantity,
        tx.price,
        tx.amount,
    )
}

/// Insert records, skipping those already stored by an earlier import
///
/// Identical records can legitimately repeat (two equal fills on one day),
/// so duplicates are counted per key: a key stored N times absorbs the first
/// N occurrences in `transactions`, the rest are inserted.
pub fn store_transactions(conn: &mut Connection, transactions: &[Transaction]) -> Result<ImportStats> {
    let mut already_stored: HashMap<RecordKey, usize> = HashMap::new();
    for tx in transactions {
        let key = record_key(tx);
        if !already_stored.contains_key(&key) {
            let count = db::count_matching_transactions(conn, tx)?;
            already_stored.insert(key, count);
        }
    }

    let db_tx = conn.transaction().context("Failed to start import transaction")?;
    let mut stats = ImportStats::default();

    for tx in transactions {
        let remaining = already_stored.entry(record_key(tx)).or_insert(0);
        if *remaining > 0 {
            *remaining -= 1;
            stats.duplicates += 1;
            debug!("Duplicate {} {} on {}", tx.kind.as_str(), tx.symbol, tx.date);
            continue;
        }

        db::insert_transaction(&db_tx, tx)
            .with_context(|| format!("Failed to insert {} {} on {}", tx.kind.as_str(), tx.symbol, tx.date))?;
        stats.imported += 1;
    }

    db_tx.commit().context("Failed to commit import")?;
    info!(
        "Imported {} transactions ({} duplicates skipped)",
        stats.imported, stats.duplicates
    );
    Ok(stats)
}
