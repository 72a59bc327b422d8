use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::trace;

use crate::error::TaxError;

/// Reference to a lot inside a [`LotLedger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LotId(pub u64);

/// Open purchase lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lot {
    pub id: LotId,
    pub symbol: String,
    pub open_date: NaiveDate,
    pub remaining_quantity: Decimal,
    pub unit_cost: Decimal,
    /// Cost still attached to the unsold units
    pub remaining_cost: Decimal,
}

/// Per-symbol FIFO queues of open lots
///
/// Lots are kept in the order they were opened. A lot leaves its queue as
/// soon as its remaining quantity reaches zero.
#[derive(Debug, Default)]
pub struct LotLedger {
    queues: BTreeMap<String, VecDeque<Lot>>,
    next_id: u64,
}

impl LotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lot to the symbol's queue and return its reference
    pub fn open(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> LotId {
        self.open_with_cost(symbol, date, quantity, unit_cost * quantity)
    }

    /// Append a lot whose total cost is known exactly (e.g. includes fees)
    pub fn open_with_cost(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        quantity: Decimal,
        total_cost: Decimal,
    ) -> LotId {
        self.next_id += 1;
        let id = LotId(self.next_id);
        let unit_cost = if quantity > Decimal::ZERO {
            total_cost / quantity
        } else {
            Decimal::ZERO
        };

        trace!(symbol, %date, %quantity, %unit_cost, lot = id.0, "Open lot");

        self.queues.entry(symbol.to_string()).or_default().push_back(Lot {
            id,
            symbol: symbol.to_string(),
            open_date: date,
            remaining_quantity: quantity,
            unit_cost,
            remaining_cost: total_cost,
        });
        id
    }

    /// Oldest lot that still holds units
    pub fn peek_oldest(&self, symbol: &str) -> Result<&Lot, TaxError> {
        self.queues
            .get(symbol)
            .and_then(|queue| queue.iter().find(|lot| lot.remaining_quantity > Decimal::ZERO))
            .ok_or_else(|| TaxError::NoOpenLots(symbol.to_string()))
    }

    /// Take `quantity` units out of a lot, returning the cost released
    ///
    /// Emptying a lot releases exactly its remaining cost; partial takes are
    /// priced at the lot's unit cost.
    pub fn consume(&mut self, symbol: &str, lot: LotId, quantity: Decimal) -> Result<Decimal, TaxError> {
        let queue = self
            .queues
            .get_mut(symbol)
            .ok_or_else(|| TaxError::NoOpenLots(symbol.to_string()))?;
        let position = queue
            .iter()
            .position(|l| l.id == lot)
            .ok_or_else(|| TaxError::InsufficientLotQuantity {
                symbol: symbol.to_string(),
                lot: lot.0,
                remaining: Decimal::ZERO,
                requested: quantity,
            })?;

        let entry = &mut queue[position];
        if quantity > entry.remaining_quantity {
            return Err(TaxError::InsufficientLotQuantity {
                symbol: symbol.to_string(),
                lot: lot.0,
                remaining: entry.remaining_quantity,
                requested: quantity,
            });
        }

        let released = if quantity == entry.remaining_quantity {
            entry.remaining_cost
        } else {
            entry.unit_cost * quantity
        };
        entry.remaining_quantity -= quantity;
        entry.remaining_cost -= released;

        if entry.remaining_quantity.is_zero() {
            queue.remove(position);
        }
        if queue.is_empty() {
            self.queues.remove(symbol);
        }

        Ok(released)
    }

    /// Total units still open for a symbol
    pub fn open_quantity(&self, symbol: &str) -> Decimal {
        self.open_lots(symbol).map(|lot| lot.remaining_quantity).sum()
    }

    pub fn open_lots<'a>(&'a self, symbol: &str) -> impl Iterator<Item = &'a Lot> + 'a {
        self.queues.get(symbol).into_iter().flatten()
    }

    /// Symbols with at least one open lot, alphabetically
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    /// Consume the ledger, yielding every open lot grouped by symbol
    pub fn into_lots(self) -> Vec<Lot> {
        self.queues.into_values().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    #[test]
    fn test_peek_oldest_follows_insertion_order() {
        let mut ledger = LotLedger::new();
        let first = ledger.open("AAPL", date(2), dec!(10), dec!(10));
        ledger.open("AAPL", date(2), dec!(5), dec!(20));

        assert_eq!(ledger.peek_oldest("AAPL").unwrap().id, first);
        assert_eq!(ledger.open_quantity("AAPL"), dec!(15));
    }

    #[test]
    fn test_peek_on_unknown_symbol_signals_no_open_lots() {
        let ledger = LotLedger::new();
        assert_eq!(
            ledger.peek_oldest("MSFT"),
            Err(TaxError::NoOpenLots("MSFT".to_string()))
        );
    }

    #[test]
    fn test_consume_partial_then_full_releases_exact_cost() {
        let mut ledger = LotLedger::new();
        let lot = ledger.open_with_cost("AAPL", date(3), dec!(3), dec!(100));

        let first = ledger.consume("AAPL", lot, dec!(1)).unwrap();
        let rest = ledger.consume("AAPL", lot, dec!(2)).unwrap();

        assert_eq!(first + rest, dec!(100));
        assert!(ledger.peek_oldest("AAPL").is_err());
        assert_eq!(ledger.symbols().count(), 0);
    }

    #[test]
    fn test_consume_more_than_remaining_fails() {
        let mut ledger = LotLedger::new();
        let lot = ledger.open("AAPL", date(4), dec!(2), dec!(10));

        let err = ledger.consume("AAPL", lot, dec!(3)).unwrap_err();
        assert_eq!(
            err,
            TaxError::InsufficientLotQuantity {
                symbol: "AAPL".to_string(),
                lot: lot.0,
                remaining: dec!(2),
                requested: dec!(3),
            }
        );
        // Failed consume leaves the lot untouched
        assert_eq!(ledger.open_quantity("AAPL"), dec!(2));
    }

    #[test]
    fn test_exhausted_lot_is_removed_and_next_becomes_oldest() {
        let mut ledger = LotLedger::new();
        let a = ledger.open("AAPL", date(1), dec!(1), dec!(10));
        let b = ledger.open("AAPL", date(5), dec!(1), dec!(12));

        ledger.consume("AAPL", a, dec!(1)).unwrap();
        assert_eq!(ledger.peek_oldest("AAPL").unwrap().id, b);
        assert_eq!(ledger.open_lots("AAPL").count(), 1);
    }
}
