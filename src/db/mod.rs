// Database module - SQLite connection and transaction store

pub mod models;

use anyhow::{Context, Result};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

use crate::tax::{TransactionQuery, TransactionStore};
pub use models::{Transaction, TransactionKind, CASH_SYMBOL};

/// Get the default database path (~/.taxlot/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let taxlot_dir = PathBuf::from(home).join(".taxlot");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&taxlot_dir).context("Failed to create .taxlot directory")?;

    Ok(taxlot_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// Creates the database file when missing and applies the schema. The schema
/// only uses `IF NOT EXISTS` statements so running it twice is harmless.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    apply_schema(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Run the schema SQL against an open connection
pub fn apply_schema(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")
}

/// Insert transaction
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (
            symbol, kind, date, quantity, price, amount, description, source
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tx.symbol,
            tx.kind.as_str(),
            tx.date,
            tx.quantity.as_ref().map(|d| d.to_string()),
            tx.price.as_ref().map(|d| d.to_string()),
            tx.amount.to_string(),
            tx.description,
            tx.source,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Count stored rows carrying the same record key as `tx`
///
/// Decimals are stored as text, so the comparison happens after loading the
/// candidates: `10` and `10.00` must count as the same quantity.
pub fn count_matching_transactions(conn: &Connection, tx: &Transaction) -> Result<usize> {
    let candidates = query_transactions(
        conn,
        &TransactionQuery::for_symbol(&tx.symbol).between(tx.date, tx.date),
    )?;

    Ok(candidates
        .iter()
        .filter(|c| {
            c.kind == tx.kind
                && c.quantity == tx.quantity
                && c.price == tx.price
                && c.amount == tx.amount
        })
        .count())
}

/// Load transactions ordered by date (ties keep insertion order)
pub fn query_transactions(conn: &Connection, query: &TransactionQuery) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, symbol, kind, date, quantity, price, amount, description, source
         FROM transactions
         WHERE (?1 IS NULL OR symbol = ?1)
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)
         ORDER BY date ASC, id ASC",
    )?;

    let transactions = stmt
        .query_map(params![query.symbol, query.from, query.to], |row| {
            let kind_str: String = row.get(2)?;
            let kind = TransactionKind::from_str(&kind_str).map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    Type::Text,
                    format!("unknown transaction kind '{}'", kind_str).into(),
                )
            })?;

            Ok(Transaction {
                id: Some(row.get(0)?),
                symbol: row.get(1)?,
                kind,
                date: row.get(3)?,
                quantity: get_optional_decimal_value(row, 4)?,
                price: get_optional_decimal_value(row, 5)?,
                amount: get_decimal_value(row, 6)?,
                description: row.get(7)?,
                source: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load transactions")?;

    debug!("Loaded {} transactions for {:?}", transactions.len(), query);
    Ok(transactions)
}

/// Distinct symbols present in the store
pub fn list_symbols(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT symbol FROM transactions ORDER BY symbol")?;
    let symbols = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(symbols)
}

impl TransactionStore for Connection {
    fn query_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        query_transactions(self, query)
    }
}

/// Helper to read Decimal from SQLite (handles both INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    match get_optional_decimal_value(row, idx)? {
        Some(value) => Ok(value),
        None => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            Type::Null,
        )),
    }
}

/// Helper to read optional Decimal from SQLite
fn get_optional_decimal_value(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<Decimal>, rusqlite::Error> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))?;
            Decimal::from_str(s.trim())
                .map(Some)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Some(Decimal::from(i))),
        ValueRef::Real(f) => Decimal::try_from(f)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Real, Box::new(e))),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            Type::Blob,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_insert_and_query_round_trip_keeps_nulls() {
        let conn = memory_db();
        let div = Transaction::dividend("KO", date(2023, 4, 1), dec!(46.20)).with_source("TEST");
        insert_transaction(&conn, &div).unwrap();

        let loaded = query_transactions(&conn, &TransactionQuery::all()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind, TransactionKind::Dividend);
        assert_eq!(loaded[0].quantity, None);
        assert_eq!(loaded[0].price, None);
        assert_eq!(loaded[0].amount, dec!(46.20));
        assert_eq!(loaded[0].source, "TEST");
    }

    #[test]
    fn test_query_orders_by_date_then_insertion() {
        let conn = memory_db();
        let late = Transaction::buy("AAPL", date(2023, 2, 1), dec!(1), dec!(10));
        let first = Transaction::buy("AAPL", date(2023, 1, 1), dec!(2), dec!(10));
        let second = Transaction::sell("AAPL", date(2023, 1, 1), dec!(1), dec!(11));
        for tx in [&late, &first, &second] {
            insert_transaction(&conn, tx).unwrap();
        }

        let loaded = query_transactions(&conn, &TransactionQuery::for_symbol("AAPL")).unwrap();
        let kinds: Vec<_> = loaded.iter().map(|t| (t.date, t.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (date(2023, 1, 1), TransactionKind::Buy),
                (date(2023, 1, 1), TransactionKind::Sell),
                (date(2023, 2, 1), TransactionKind::Buy),
            ]
        );
    }

    #[test]
    fn test_query_filters_symbol_and_range() {
        let conn = memory_db();
        insert_transaction(&conn, &Transaction::buy("AAPL", date(2022, 6, 1), dec!(1), dec!(1))).unwrap();
        insert_transaction(&conn, &Transaction::buy("AAPL", date(2023, 6, 1), dec!(1), dec!(1))).unwrap();
        insert_transaction(&conn, &Transaction::buy("MSFT", date(2023, 6, 1), dec!(1), dec!(1))).unwrap();

        let aapl_2023 = query_transactions(
            &conn,
            &TransactionQuery::for_symbol("AAPL").between(date(2023, 1, 1), date(2023, 12, 31)),
        )
        .unwrap();
        assert_eq!(aapl_2023.len(), 1);
        assert_eq!(aapl_2023[0].date, date(2023, 6, 1));

        let through_2022 = query_transactions(&conn, &TransactionQuery::all().through(date(2022, 12, 31))).unwrap();
        assert_eq!(through_2022.len(), 1);

        assert_eq!(list_symbols(&conn).unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_count_matching_ignores_decimal_scale() {
        let conn = memory_db();
        let buy = Transaction::buy("AAPL", date(2023, 1, 5), dec!(10), dec!(1.5));
        insert_transaction(&conn, &buy).unwrap();

        let same = Transaction::trade(
            TransactionKind::Buy,
            "AAPL",
            date(2023, 1, 5),
            dec!(10.000),
            dec!(1.50),
            dec!(-15.0),
        );
        assert_eq!(count_matching_transactions(&conn, &same).unwrap(), 1);

        let other = Transaction::buy("AAPL", date(2023, 1, 5), dec!(11), dec!(1.5));
        assert_eq!(count_matching_transactions(&conn, &other).unwrap(), 0);
    }

    #[test]
    fn test_decimal_reader_accepts_real_and_integer() {
        let conn = memory_db();
        conn.execute(
            "INSERT INTO transactions (symbol, kind, date, quantity, price, amount)
             VALUES ('X', 'BUY', '2023-01-01', 3, 2.5, -7.5)",
            [],
        )
        .unwrap();

        let loaded = query_transactions(&conn, &TransactionQuery::all()).unwrap();
        assert_eq!(loaded[0].quantity, Some(dec!(3)));
        assert_eq!(loaded[0].price, Some(dec!(2.5)));
        assert_eq!(loaded[0].amount, dec!(-7.5));
    }
}
