use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::DateBasis;
use crate::db::{Transaction, TransactionKind, CASH_SYMBOL};

/// One data row of a brokerage activity export, fields already typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    /// Record number in the file (header is 1)
    pub row: usize,
    pub activity_date: NaiveDate,
    pub settle_date: Option<NaiveDate>,
    pub instrument: String,
    pub description: String,
    pub trans_code: String,
    pub kind: TransactionKind,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub amount: Option<Decimal>,
}

/// Row left out of the import, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub row: usize,
    pub trans_code: String,
    pub instrument: String,
    pub reason: &'static str,
}

/// Parsed export: rows to import plus rows deliberately skipped
#[derive(Debug, Default)]
pub struct ParsedExport {
    pub transactions: Vec<RawTransaction>,
    pub skipped: Vec<SkippedRow>,
}

impl RawTransaction {
    /// Build the normalized record, dated per `date_basis`
    pub fn to_transaction(&self, date_basis: DateBasis) -> Result<Transaction> {
        let date = match date_basis {
            DateBasis::Trade => self.activity_date,
            DateBasis::Settle => self
                .settle_date
                .ok_or_else(|| anyhow!("Row {}: settle date is missing", self.row))?,
        };

        let symbol = if is_option_code(&self.trans_code) {
            option_contract(&self.description)
                .ok_or_else(|| anyhow!("Row {}: {} row has no contract description", self.row, self.trans_code))?
        } else {
            match self.instrument.trim() {
                "" if self.kind == TransactionKind::Interest => CASH_SYMBOL.to_string(),
                "" => bail!("Row {}: {} row has no instrument", self.row, self.trans_code),
                s => s.to_uppercase(),
            }
        };

        let tx = if self.trans_code == "OEXP" {
            // Worthless expiry of a long contract closes the lot with no proceeds
            let quantity = self
                .quantity
                .ok_or_else(|| anyhow!("Row {}: quantity is missing", self.row))?;
            let amount = self.amount.unwrap_or(Decimal::ZERO);
            Transaction::trade(TransactionKind::Sell, &symbol, date, quantity, Decimal::ZERO, amount)
        } else if self.kind.is_trade() {
            let quantity = self
                .quantity
                .ok_or_else(|| anyhow!("Row {}: quantity is missing", self.row))?;
            let price = self
                .price
                .ok_or_else(|| anyhow!("Row {}: price is missing", self.row))?;
            let multiplier = if is_option_code(&self.trans_code) {
                OPTION_MULTIPLIER
            } else {
                Decimal::ONE
            };
            let amount = match (self.amount, self.kind) {
                (Some(amount), _) => amount,
                (None, TransactionKind::Buy) => -(quantity * price * multiplier),
                (None, _) => quantity * price * multiplier,
            };
            Transaction::trade(self.kind, &symbol, date, quantity, price, amount)
        } else {
            let amount = self
                .amount
                .ok_or_else(|| anyhow!("Row {}: amount is missing", self.row))?;
            match self.kind {
                TransactionKind::Dividend => Transaction::dividend(&symbol, date, amount),
                _ => Transaction::interest(&symbol, date, amount),
            }
        };

        let description = Some(self.description.trim().to_string()).filter(|d| !d.is_empty());
        let tx = tx.with_source("CSV").with_description(description);

        tx.validate().with_context(|| format!("Row {}", self.row))?;
        Ok(tx)
    }
}

/// Shares controlled by one listed option contract
pub const OPTION_MULTIPLIER: Decimal = Decimal::ONE_HUNDRED;

/// Long option codes: the contract, not the underlying, is the security
fn is_option_code(code: &str) -> bool {
    matches!(code, "BTO" | "STC" | "OEXP")
}

/// Contract name from an option row description
///
/// `"AAPL 6/16/2023 Call $150.00"` and
/// `"Option Expiration for AAPL 6/16/2023 Call $150.00"` both name the
/// contract `AAPL 6/16/2023 Call $150.00`.
fn option_contract(description: &str) -> Option<String> {
    let line = description.lines().next()?.trim();
    let contract = match line.get(..OEXP_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(OEXP_PREFIX) => &line[OEXP_PREFIX.len()..],
        _ => line,
    };
    let contract = contract.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(contract).filter(|c| !c.is_empty())
}

const OEXP_PREFIX: &str = "Option Expiration for ";

/// Short positions expire with an `S` suffix on the quantity ("1S")
fn is_short_quantity(text: &str) -> bool {
    text.trim().ends_with(['S', 's'])
}

/// Parse a brokerage activity CSV file
pub fn parse_broker_csv<P: AsRef<Path>>(file_path: P) -> Result<ParsedExport> {
    let path = file_path.as_ref();
    info!("Parsing brokerage CSV file: {:?}", path);

    let file = std::fs::File::open(path).context("Failed to open CSV file")?;
    parse_broker_csv_reader(file)
}

/// Parse brokerage activity CSV from any reader
pub fn parse_broker_csv_reader<R: Read>(input: R) -> Result<ParsedExport> {
    let mut reader = ReaderBuilder::new()
        .flexible(true) // Footer rows carry a different column count
        .from_reader(input);

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();

    debug!("CSV headers: {:?}", headers);

    let mapping = find_columns(&headers)?;
    debug!("Column mapping: {:?}", mapping);

    let mut parsed = ParsedExport::default();

    for (idx, result) in reader.records().enumerate() {
        let row_num = idx + 2;
        let record = result.with_context(|| format!("Failed to read CSV record at row {}", row_num))?;

        if is_end_of_data(&record, &mapping) {
            debug!("Data ends at row {}", row_num);
            break;
        }

        match parse_csv_row(&record, &mapping, row_num)? {
            RowOutcome::Parsed(tx) => parsed.transactions.push(tx),
            RowOutcome::Skipped(skip) => {
                warn!(
                    "Skipping row {} ({} {}): {}",
                    skip.row, skip.trans_code, skip.instrument, skip.reason
                );
                parsed.skipped.push(skip);
            }
        }
    }

    info!(
        "Successfully parsed {} transactions from CSV ({} skipped)",
        parsed.transactions.len(),
        parsed.skipped.len()
    );
    Ok(parsed)
}

#[derive(Debug)]
struct CsvColumnMapping {
    activity_date: usize,
    settle_date: Option<usize>,
    instrument: usize,
    description: Option<usize>,
    trans_code: usize,
    quantity: usize,
    price: usize,
    amount: usize,
}

fn find_columns(headers: &csv::StringRecord) -> Result<CsvColumnMapping> {
    let mut activity_idx = None;
    let mut settle_idx = None;
    let mut instrument_idx = None;
    let mut description_idx = None;
    let mut code_idx = None;
    let mut quantity_idx = None;
    let mut price_idx = None;
    let mut amount_idx = None;

    for (idx, header) in headers.iter().enumerate() {
        let text = header.trim().to_lowercase();

        if text.contains("activity") || text == "date" || text.contains("trade date") {
            activity_idx.get_or_insert(idx);
        }
        if text.contains("settle") {
            settle_idx = Some(idx);
        }
        if text.contains("instrument") || text == "symbol" || text.contains("ticker") {
            instrument_idx = Some(idx);
        }
        if text.contains("description") {
            description_idx = Some(idx);
        }
        if text.contains("trans code") || text == "code" || text.contains("action") {
            code_idx = Some(idx);
        }
        if text.contains("quantity") || text == "qty" {
            quantity_idx = Some(idx);
        }
        if text == "price" || text.contains("price per") {
            price_idx = Some(idx);
        }
        if text.contains("amount") {
            amount_idx = Some(idx);
        }
    }

    Ok(CsvColumnMapping {
        activity_date: activity_idx.ok_or_else(|| anyhow!("Activity date column not found"))?,
        settle_date: settle_idx,
        instrument: instrument_idx.ok_or_else(|| anyhow!("Instrument column not found"))?,
        description: description_idx,
        trans_code: code_idx.ok_or_else(|| anyhow!("Trans code column not found"))?,
        quantity: quantity_idx.ok_or_else(|| anyhow!("Quantity column not found"))?,
        price: price_idx.ok_or_else(|| anyhow!("Price column not found"))?,
        amount: amount_idx.ok_or_else(|| anyhow!("Amount column not found"))?,
    })
}

/// Blank rows and the disclaimer footer end the data section
fn is_end_of_data(record: &csv::StringRecord, mapping: &CsvColumnMapping) -> bool {
    let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");
    record.iter().all(|f| f.trim().is_empty())
        || (field(mapping.activity_date).is_empty() && field(mapping.trans_code).is_empty())
}

enum RowOutcome {
    Parsed(RawTransaction),
    Skipped(SkippedRow),
}

fn skip_reason(code: &str) -> &'static str {
    match code {
        "SPL" | "SPR" => "stock splits are not applied to lots",
        "STO" | "BTC" | "OEXP" | "OASGN" => "short option positions are not supported",
        _ => "not a trade, dividend or interest",
    }
}

fn parse_csv_row(
    record: &csv::StringRecord,
    mapping: &CsvColumnMapping,
    row_num: usize,
) -> Result<RowOutcome> {
    let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

    let trans_code = field(mapping.trans_code).to_uppercase();
    let instrument = field(mapping.instrument).to_string();

    let kind = match TransactionKind::from_str(&trans_code) {
        Ok(kind) => kind,
        Err(_) if trans_code == "OEXP" && !is_short_quantity(field(mapping.quantity)) => {
            TransactionKind::Sell
        }
        Err(_) => {
            return Ok(RowOutcome::Skipped(SkippedRow {
                row: row_num,
                reason: skip_reason(&trans_code),
                trans_code,
                instrument,
            }));
        }
    };

    let activity_date = parse_csv_date(field(mapping.activity_date))
        .with_context(|| format!("Row {}: invalid activity date", row_num))?;
    let settle_date = match mapping.settle_date.map(field).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            parse_csv_date(s).with_context(|| format!("Row {}: invalid settle date", row_num))?,
        ),
        None => None,
    };

    let quantity = parse_optional(field(mapping.quantity), parse_quantity)
        .with_context(|| format!("Row {}: invalid quantity", row_num))?;
    let price = parse_optional(field(mapping.price), parse_money)
        .with_context(|| format!("Row {}: invalid price", row_num))?;
    let amount = parse_optional(field(mapping.amount), parse_money)
        .with_context(|| format!("Row {}: invalid amount", row_num))?;

    Ok(RowOutcome::Parsed(RawTransaction {
        row: row_num,
        activity_date,
        settle_date,
        instrument,
        description: mapping.description.map(field).unwrap_or("").to_string(),
        trans_code,
        kind,
        quantity,
        price,
        amount,
    }))
}

fn parse_optional(text: &str, parse: fn(&str) -> Result<Decimal>) -> Result<Option<Decimal>> {
    if text.is_empty() {
        Ok(None)
    } else {
        parse(text).map(Some)
    }
}

fn parse_csv_date(date_str: &str) -> Result<NaiveDate> {
    // US export format first, ISO as a fallback
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%m/%d/%Y") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(anyhow!("Could not parse date: {}", date_str))
}

/// Parse "$1,234.56" / "($1,234.56)" / "-1234.56"
fn parse_money(text: &str) -> Result<Decimal> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    let value = Decimal::from_str(&cleaned)
        .with_context(|| format!("Failed to parse money value '{}'", text))?;

    Ok(if negative { -value } else { value })
}

fn parse_quantity(text: &str) -> Result<Decimal> {
    let cleaned = text.replace(',', "");
    Decimal::from_str(cleaned.trim())
        .with_context(|| format!("Failed to parse quantity '{}'", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "\"Activity Date\",\"Process Date\",\"Settle Date\",\"Instrument\",\"Description\",\"Trans Code\",\"Quantity\",\"Price\",\"Amount\"\n";

    fn parse(body: &str) -> Result<ParsedExport> {
        parse_broker_csv_reader(format!("{}{}", HEADER, body).as_bytes())
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("$1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_money("($1,234.56)").unwrap(), dec!(-1234.56));
        assert_eq!(parse_money("-12.5").unwrap(), dec!(-12.5));
        assert!(parse_money("$abc").is_err());
    }

    #[test]
    fn test_parse_csv_date() {
        assert_eq!(
            parse_csv_date("03/15/2023").unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()
        );
        assert_eq!(
            parse_csv_date("2023-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()
        );
        assert!(parse_csv_date("15/03/2023").is_err());
    }

    #[test]
    fn test_trade_and_income_rows() {
        let parsed = parse(
            "\"1/3/2023\",\"1/3/2023\",\"1/5/2023\",\"AAPL\",\"Apple\nCUSIP: 037833100\",\"Buy\",\"10\",\"$125.07\",\"($1,250.70)\"\n\
             \"2/16/2023\",\"2/16/2023\",\"2/16/2023\",\"AAPL\",\"Cash Div: R/D 2023-02-13\",\"CDIV\",\"\",\"\",\"$2.30\"\n\
             \"2/28/2023\",\"2/28/2023\",\"2/28/2023\",\"\",\"Interest Payment\",\"INT\",\"\",\"\",\"$0.41\"\n",
        )
        .unwrap();

        assert_eq!(parsed.transactions.len(), 3);
        assert!(parsed.skipped.is_empty());

        let buy = parsed.transactions[0].to_transaction(DateBasis::Trade).unwrap();
        assert_eq!(buy.kind, TransactionKind::Buy);
        assert_eq!(buy.quantity, Some(dec!(10)));
        assert_eq!(buy.amount, dec!(-1250.70));
        assert_eq!(buy.date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());

        let settled = parsed.transactions[0].to_transaction(DateBasis::Settle).unwrap();
        assert_eq!(settled.date, NaiveDate::from_ymd_opt(2023, 1, 5).unwrap());

        let div = parsed.transactions[1].to_transaction(DateBasis::Trade).unwrap();
        assert_eq!(div.kind, TransactionKind::Dividend);
        assert_eq!(div.quantity, None);

        let interest = parsed.transactions[2].to_transaction(DateBasis::Trade).unwrap();
        assert_eq!(interest.symbol, CASH_SYMBOL);
        assert_eq!(interest.amount, dec!(0.41));
    }

    #[test]
    fn test_unsupported_codes_are_skipped() {
        let parsed = parse(
            "\"1/3/2023\",\"1/3/2023\",\"1/5/2023\",\"\",\"ACH Deposit\",\"ACH\",\"\",\"\",\"$500.00\"\n\
             \"1/4/2023\",\"1/4/2023\",\"1/4/2023\",\"NVDA\",\"Forward Split\",\"SPL\",\"36\",\"\",\"\"\n",
        )
        .unwrap();

        assert!(parsed.transactions.is_empty());
        assert_eq!(parsed.skipped.len(), 2);
        assert_eq!(parsed.skipped[1].reason, "stock splits are not applied to lots");
        assert_eq!(parsed.skipped[1].row, 3);
    }

    #[test]
    fn test_footer_stops_parsing() {
        let parsed = parse(
            "\"1/3/2023\",\"1/3/2023\",\"1/5/2023\",\"AAPL\",\"Apple\",\"Buy\",\"1\",\"$100.00\",\"($100.00)\"\n\
             \n\
             \"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"The data provided is for informational purposes only.\"\n",
        )
        .unwrap();
        assert_eq!(parsed.transactions.len(), 1);
    }

    #[test]
    fn test_bad_field_in_trade_row_fails_with_row_number() {
        let err = parse(
            "\"1/3/2023\",\"1/3/2023\",\"1/5/2023\",\"AAPL\",\"Apple\",\"Sell\",\"ten\",\"$100.00\",\"$1,000.00\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Row 2"));
    }

    #[test]
    fn test_missing_amount_is_derived() {
        let parsed = parse(
            "\"1/3/2023\",\"1/3/2023\",\"1/5/2023\",\"MSFT\",\"Microsoft\",\"Sell\",\"2\",\"$250.00\",\"\"\n",
        )
        .unwrap();
        let sell = parsed.transactions[0].to_transaction(DateBasis::Trade).unwrap();
        assert_eq!(sell.amount, dec!(500));
    }

    #[test]
    fn test_option_rows_use_contract_as_symbol() {
        let parsed = parse(
            "\"1/3/2023\",\"1/3/2023\",\"1/4/2023\",\"AAPL\",\"AAPL 6/16/2023 Call $150.00\",\"BTO\",\"1\",\"$2.00\",\"\"\n\
             \"1/5/2023\",\"1/5/2023\",\"1/9/2023\",\"AAPL\",\"Apple\",\"Buy\",\"10\",\"$100.00\",\"($1,000.00)\"\n",
        )
        .unwrap();

        let option = parsed.transactions[0].to_transaction(DateBasis::Trade).unwrap();
        assert_eq!(option.symbol, "AAPL 6/16/2023 Call $150.00");
        assert_eq!(option.kind, TransactionKind::Buy);
        // Premium per share × 100 shares per contract
        assert_eq!(option.amount, dec!(-200.00));

        let stock = parsed.transactions[1].to_transaction(DateBasis::Trade).unwrap();
        assert_eq!(stock.symbol, "AAPL");
    }

    #[test]
    fn test_long_option_expiry_is_a_worthless_sale() {
        let parsed = parse(
            "\"6/16/2023\",\"6/16/2023\",\"6/16/2023\",\"AAPL\",\"Option Expiration for AAPL 6/16/2023 Call $150.00\",\"OEXP\",\"1\",\"\",\"\"\n\
             \"6/16/2023\",\"6/16/2023\",\"6/16/2023\",\"TSLA\",\"Option Expiration for TSLA 6/16/2023 Put $180.00\",\"OEXP\",\"2S\",\"\",\"\"\n",
        )
        .unwrap();

        assert_eq!(parsed.transactions.len(), 1);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].reason, "short option positions are not supported");

        let expiry = parsed.transactions[0].to_transaction(DateBasis::Trade).unwrap();
        assert_eq!(expiry.symbol, "AAPL 6/16/2023 Call $150.00");
        assert_eq!(expiry.kind, TransactionKind::Sell);
        assert_eq!(expiry.quantity, Some(dec!(1)));
        assert_eq!(expiry.price, Some(Decimal::ZERO));
        assert_eq!(expiry.amount, Decimal::ZERO);
    }

    #[test]
    fn test_option_row_without_description_fails() {
        let parsed = parse(
            "\"1/3/2023\",\"1/3/2023\",\"1/4/2023\",\"AAPL\",\"\",\"BTO\",\"1\",\"$2.00\",\"($200.00)\"\n",
        )
        .unwrap();
        let err = parsed.transactions[0].to_transaction(DateBasis::Trade).unwrap_err();
        assert!(err.to_string().contains("no contract description"));
    }

    #[test]
    fn test_missing_required_column() {
        let err = parse_broker_csv_reader("Date,Symbol,Quantity\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("column not found"));
    }
}
