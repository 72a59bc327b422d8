//! Utility functions for formatting and common operations
//!
//! This module provides centralized formatting utilities for consistent
//! display of currency and decimal values throughout the application.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "$" prefix (US Dollar)
    Usd,
    /// No currency symbol (quantities, table cells)
    None,
}

/// Core formatting function with full control over output.
///
/// Formats a Decimal value using US conventions, rounded to cents:
/// - Thousands separator: `,`
/// - Decimal separator: `.`
/// - Negative values carry a leading `-` before the symbol
///
/// # Examples
/// ```
/// use taxlot::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Usd),
///     "$1,234.56"
/// );
///
/// assert_eq!(
///     format_currency_with_width(dec!(-1234), 12, CurrencySymbol::None),
///     "   -1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", value.abs().round_dp(2));
    let (integer_part, decimal_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    // Add thousands separators (,) to integer part
    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    // -0.001 rounds to 0.00 and must not print as "-$0.00"
    let sign = if is_negative && formatted != "0.00" { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Usd => "$",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", sign, prefix, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format as US Dollar: "$1,234.56"
///
/// # Examples
/// ```
/// use taxlot::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
/// assert_eq!(format_currency(dec!(-500)), "-$500.00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Usd)
}

/// Format a share quantity without trailing zeros: "10", "0.5"
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Parse a tax year argument (e.g. "2023")
pub fn parse_tax_year(s: &str) -> Result<i32, String> {
    let year: i32 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a year", s))?;
    if (1900..=2100).contains(&year) {
        Ok(year)
    } else {
        Err(format!("year {} is out of range", year))
    }
}

/// Parse a date argument: YYYY-MM-DD, or YYYY meaning December 31
pub fn parse_as_of_date(s: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return Ok(date);
    }
    let year = parse_tax_year(s)?;
    NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| format!("invalid year {}", year))
}
