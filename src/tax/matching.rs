use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::classification::{classify_term, Term};
use super::ledger::{Lot, LotLedger};
use crate::db::{Transaction, TransactionKind};
use crate::error::TaxError;

/// Gain or loss realized by closing (part of) one lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealizedEvent {
    pub symbol: String,
    pub lot_open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub quantity_matched: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub gain_loss: Decimal,
    pub term: Term,
}

/// FIFO matcher pairing sales with the oldest open purchase lots
#[derive(Debug, Default)]
pub struct FifoMatcher {
    ledger: LotLedger,
}

impl FifoMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a lot for a purchase. Zero-quantity purchases open nothing.
    pub fn add_purchase(&mut self, tx: &Transaction) -> Result<(), TaxError> {
        if tx.kind != TransactionKind::Buy {
            return Err(tx.invalid("transaction is not a purchase"));
        }
        tx.validate()?;

        let quantity = tx.traded_quantity()?;
        if quantity.is_zero() {
            debug!("Ignoring zero-quantity purchase of {} on {}", tx.symbol, tx.date);
            return Ok(());
        }

        self.ledger
            .open_with_cost(&tx.symbol, tx.date, quantity, -tx.amount);
        Ok(())
    }

    /// Match a sale against open lots, oldest first
    ///
    /// Returns one event per lot touched. When the open lots cannot cover the
    /// sale, every satisfiable lot has already been consumed by the time
    /// `OversoldPosition` is returned; the matcher must not be reused.
    pub fn match_sale(&mut self, tx: &Transaction) -> Result<Vec<RealizedEvent>, TaxError> {
        if tx.kind != TransactionKind::Sell {
            return Err(tx.invalid("transaction is not a sale"));
        }
        tx.validate()?;

        let quantity = tx.traded_quantity()?;
        let mut events = Vec::new();
        if quantity.is_zero() {
            return Ok(events);
        }

        let mut remaining = quantity;
        let mut proceeds_left = tx.amount;

        while remaining > Decimal::ZERO {
            let lot = match self.ledger.peek_oldest(&tx.symbol) {
                Ok(lot) => lot,
                Err(TaxError::NoOpenLots(_)) => {
                    return Err(TaxError::OversoldPosition {
                        symbol: tx.symbol.clone(),
                        date: tx.date,
                        requested: quantity,
                        unmatched: remaining,
                    });
                }
                Err(e) => return Err(e),
            };
            let (lot_id, lot_open_date) = (lot.id, lot.open_date);
            let take = remaining.min(lot.remaining_quantity);

            let cost_basis = self.ledger.consume(&tx.symbol, lot_id, take)?;
            remaining -= take;

            // Last slice absorbs the rounding remainder
            let proceeds = if remaining.is_zero() {
                proceeds_left
            } else {
                // Near the decimal range, scale by the ratio instead of the product
                tx.amount
                    .checked_mul(take)
                    .map(|scaled| scaled / quantity)
                    .unwrap_or_else(|| tx.amount * (take / quantity))
            };
            proceeds_left -= proceeds;

            let term = classify_term(lot_open_date, tx.date);
            debug!(
                "Matched {} {} from lot opened {} ({:?}): basis {}, proceeds {}",
                take, tx.symbol, lot_open_date, term, cost_basis, proceeds
            );

            events.push(RealizedEvent {
                symbol: tx.symbol.clone(),
                lot_open_date,
                close_date: tx.date,
                quantity_matched: take,
                cost_basis,
                proceeds,
                gain_loss: proceeds - cost_basis,
                term,
            });
        }

        Ok(events)
    }

    /// Feed one trade record; income records are rejected.
    pub fn process(&mut self, tx: &Transaction) -> Result<Vec<RealizedEvent>, TaxError> {
        match tx.kind {
            TransactionKind::Buy => self.add_purchase(tx).map(|_| Vec::new()),
            TransactionKind::Sell => self.match_sale(tx),
            TransactionKind::Dividend | TransactionKind::Interest => {
                Err(tx.invalid("income records bypass lot matching"))
            }
        }
    }

    pub fn remaining_quantity(&self, symbol: &str) -> Decimal {
        self.ledger.open_quantity(symbol)
    }

    pub fn open_lots<'a>(&'a self, symbol: &str) -> impl Iterator<Item = &'a Lot> + 'a {
        self.ledger.open_lots(symbol)
    }

    pub fn into_ledger(self) -> LotLedger {
        self.ledger
    }
}
