use rust_decimal::Decimal;
use serde::Serialize;

use super::classification::YearTotals;

/// Tax liability summary for one year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxSummary {
    pub tax_year: i32,
    pub short_term_gain_loss: Decimal,
    pub long_term_gain_loss: Decimal,
    pub dividend_income: Decimal,
    pub interest_income: Decimal,
    pub short_term_proceeds: Decimal,
    pub short_term_cost_basis: Decimal,
    pub long_term_proceeds: Decimal,
    pub long_term_cost_basis: Decimal,
    pub realized_count: usize,
}

impl TaxSummary {
    pub fn assemble(tax_year: i32, totals: &YearTotals) -> Self {
        Self {
            tax_year,
            short_term_gain_loss: totals.short_term_gain_loss,
            long_term_gain_loss: totals.long_term_gain_loss,
            dividend_income: totals.dividend_income,
            interest_income: totals.interest_income,
            short_term_proceeds: totals.short_term_proceeds,
            short_term_cost_basis: totals.short_term_cost_basis,
            long_term_proceeds: totals.long_term_proceeds,
            long_term_cost_basis: totals.long_term_cost_basis,
            realized_count: totals.realized_count,
        }
    }

    /// All-zero summary for a year with no activity
    pub fn empty(tax_year: i32) -> Self {
        Self::assemble(tax_year, &YearTotals::default())
    }

    pub fn net_capital_gain_loss(&self) -> Decimal {
        self.short_term_gain_loss + self.long_term_gain_loss
    }

    pub fn total_income(&self) -> Decimal {
        self.dividend_income + self.interest_income
    }

    pub fn is_empty(&self) -> bool {
        self.realized_count == 0
            && self.dividend_income.is_zero()
            && self.interest_income.is_zero()
    }
}
