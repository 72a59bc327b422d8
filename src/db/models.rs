use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TaxError;

/// Symbol assigned to cash interest rows that carry no instrument
pub const CASH_SYMBOL: &str = "CASH";

/// Transaction kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Buy,
    Sell,
    Dividend,
    Interest,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Dividend => "DIVIDEND",
            TransactionKind::Interest => "INTEREST",
        }
    }

    /// Buy and Sell move shares; Dividend and Interest only move cash.
    pub fn is_trade(&self) -> bool {
        matches!(self, TransactionKind::Buy | TransactionKind::Sell)
    }
}

impl FromStr for TransactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "BTO" => Ok(TransactionKind::Buy),
            "SELL" | "STC" => Ok(TransactionKind::Sell),
            "DIVIDEND" | "CDIV" | "DIV" | "QDIV" => Ok(TransactionKind::Dividend),
            "INTEREST" | "INT" => Ok(TransactionKind::Interest),
            _ => Err(()),
        }
    }
}

/// Normalized transaction record (trade, dividend or interest)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub symbol: String,
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    /// Signed cash effect: negative for purchases, positive for sales
    pub amount: Decimal,
    pub description: Option<String>,
    pub source: String, // 'CSV', 'MANUAL', 'TEST'
}

impl Transaction {
    /// Purchase with amount derived as -(quantity × price)
    pub fn buy(symbol: &str, date: NaiveDate, quantity: Decimal, price: Decimal) -> Self {
        Self::trade(TransactionKind::Buy, symbol, date, quantity, price, -(quantity * price))
    }

    /// Sale with amount derived as quantity × price
    pub fn sell(symbol: &str, date: NaiveDate, quantity: Decimal, price: Decimal) -> Self {
        Self::trade(TransactionKind::Sell, symbol, date, quantity, price, quantity * price)
    }

    pub fn dividend(symbol: &str, date: NaiveDate, amount: Decimal) -> Self {
        Self::cash(TransactionKind::Dividend, symbol, date, amount)
    }

    pub fn interest(symbol: &str, date: NaiveDate, amount: Decimal) -> Self {
        Self::cash(TransactionKind::Interest, symbol, date, amount)
    }

    /// Trade with an explicit cash amount (fees and multipliers already applied)
    pub fn trade(
        kind: TransactionKind,
        symbol: &str,
        date: NaiveDate,
        quantity: Decimal,
        price: Decimal,
        amount: Decimal,
    ) -> Self {
        Self {
            id: None,
            symbol: symbol.to_string(),
            kind,
            date,
            quantity: Some(quantity),
            price: Some(price),
            amount,
            description: None,
            source: "MANUAL".to_string(),
        }
    }

    fn cash(kind: TransactionKind, symbol: &str, date: NaiveDate, amount: Decimal) -> Self {
        Self {
            id: None,
            symbol: symbol.to_string(),
            kind,
            date,
            quantity: None,
            price: None,
            amount,
            description: None,
            source: "MANUAL".to_string(),
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Check the record against the data model rules without coercing anything.
    pub fn validate(&self) -> Result<(), TaxError> {
        if self.symbol.trim().is_empty() {
            return Err(self.invalid("symbol must not be empty"));
        }

        if !self.kind.is_trade() {
            return Ok(());
        }

        let quantity = self.traded_quantity()?;
        if quantity < Decimal::ZERO {
            return Err(self.invalid(format!("quantity must not be negative, got {}", quantity)));
        }

        match self.price {
            Some(price) if price > Decimal::ZERO => {}
            // Expired contracts leave the position at no price
            Some(price) if price.is_zero() && self.kind == TransactionKind::Sell => {}
            Some(price) => {
                return Err(self.invalid(format!("price must be positive, got {}", price)));
            }
            None => return Err(self.invalid("price is missing")),
        }

        match self.kind {
            TransactionKind::Buy if quantity > Decimal::ZERO && self.amount >= Decimal::ZERO => {
                Err(self.invalid(format!(
                    "purchase amount must be negative, got {}",
                    self.amount
                )))
            }
            TransactionKind::Sell if self.amount < Decimal::ZERO => Err(self.invalid(format!(
                "sale amount must not be negative, got {}",
                self.amount
            ))),
            _ => Ok(()),
        }
    }

    /// Quantity of a Buy/Sell; errors for records that do not carry one.
    pub fn traded_quantity(&self) -> Result<Decimal, TaxError> {
        self.quantity
            .ok_or_else(|| self.invalid("quantity is missing"))
    }

    /// Build an [`TaxError::InvalidRecord`] describing this record.
    pub fn invalid(&self, reason: impl Into<String>) -> TaxError {
        TaxError::InvalidRecord {
            symbol: self.symbol.clone(),
            kind: self.kind.as_str(),
            date: self.date,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
    }

    #[test]
    fn test_transaction_kind_conversions() {
        assert_eq!(TransactionKind::Buy.as_str(), "BUY");
        assert_eq!(TransactionKind::Interest.as_str(), "INTEREST");

        assert_eq!("Buy".parse::<TransactionKind>().ok(), Some(TransactionKind::Buy));
        assert_eq!("BTO".parse::<TransactionKind>().ok(), Some(TransactionKind::Buy));
        assert_eq!("stc".parse::<TransactionKind>().ok(), Some(TransactionKind::Sell));
        assert_eq!(
            "CDIV".parse::<TransactionKind>().ok(),
            Some(TransactionKind::Dividend)
        );
        assert_eq!(
            "INT".parse::<TransactionKind>().ok(),
            Some(TransactionKind::Interest)
        );
        assert_eq!("SPL".parse::<TransactionKind>().ok(), None);
        assert_eq!("ACH".parse::<TransactionKind>().ok(), None);
    }

    #[test]
    fn test_derived_amounts() {
        let buy = Transaction::buy("AAPL", day(1), dec!(10), dec!(12.5));
        assert_eq!(buy.amount, dec!(-125));
        let sell = Transaction::sell("AAPL", day(2), dec!(4), dec!(20));
        assert_eq!(sell.amount, dec!(80));
        assert!(buy.validate().is_ok());
        assert!(sell.validate().is_ok());
    }

    #[test]
    fn test_income_records_have_no_quantity() {
        let div = Transaction::dividend("KO", day(5), dec!(12.34));
        assert_eq!(div.quantity, None);
        assert_eq!(div.price, None);
        assert!(div.validate().is_ok());
        assert!(div.traded_quantity().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_price = Transaction::buy("AAPL", day(1), dec!(10), dec!(0));
        assert!(matches!(
            zero_price.validate(),
            Err(TaxError::InvalidRecord { .. })
        ));

        let negative_qty = Transaction::sell("AAPL", day(1), dec!(-1), dec!(10));
        assert!(negative_qty.validate().is_err());

        let mut positive_buy = Transaction::buy("AAPL", day(1), dec!(1), dec!(10));
        positive_buy.amount = dec!(10);
        assert!(positive_buy.validate().is_err());

        let blank = Transaction::dividend("  ", day(1), dec!(1));
        assert!(blank.validate().is_err());

        let mut no_price = Transaction::sell("AAPL", day(1), dec!(1), dec!(10));
        no_price.price = None;
        assert!(no_price.validate().is_err());
    }

    #[test]
    fn test_zero_quantity_sale_is_valid() {
        let sell = Transaction::sell("AAPL", day(1), dec!(0), dec!(10));
        assert!(sell.validate().is_ok());
    }

    #[test]
    fn test_worthless_sale_at_zero_price() {
        let expiry = Transaction::sell("AAPL 6/16/2023 Call $150.00", day(1), dec!(1), dec!(0));
        assert_eq!(expiry.amount, dec!(0));
        assert!(expiry.validate().is_ok());
    }
}
