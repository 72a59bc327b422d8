//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use taxlot::db::Transaction;
use taxlot::importers::{ImportStats, SkippedRow};
use taxlot::tax::{Lot, RealizedEvent, TaxSummary};
use taxlot::utils::{format_currency, format_quantity};

/// Pretty JSON for any serializable report value
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn colored_amount(value: Decimal) -> String {
    let text = format_currency(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

/// Format tax summaries, one block per year
pub fn format_summary_table(summaries: &[TaxSummary]) -> String {
    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "Category")]
        category: &'static str,
        #[tabled(rename = "Proceeds")]
        proceeds: String,
        #[tabled(rename = "Cost Basis")]
        cost_basis: String,
        #[tabled(rename = "Gain/Loss")]
        gain_loss: String,
    }

    let mut output = String::new();

    for summary in summaries {
        output.push_str(&format!(
            "\n{} Tax Summary {}\n\n",
            "📊".cyan().bold(),
            summary.tax_year
        ));

        let rows = vec![
            SummaryRow {
                category: "Short-term",
                proceeds: format_currency(summary.short_term_proceeds),
                cost_basis: format_currency(summary.short_term_cost_basis),
                gain_loss: colored_amount(summary.short_term_gain_loss),
            },
            SummaryRow {
                category: "Long-term",
                proceeds: format_currency(summary.long_term_proceeds),
                cost_basis: format_currency(summary.long_term_cost_basis),
                gain_loss: colored_amount(summary.long_term_gain_loss),
            },
        ];

        let mut table = Table::new(&rows);
        table.with(Style::rounded());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());

        output.push_str(&format!("\n\n{}", "━".repeat(60).bright_black()));
        output.push_str(&format!(
            "\n{:<26} {}",
            "Net capital gain/loss:".bold(),
            colored_amount(summary.net_capital_gain_loss())
        ));
        output.push_str(&format!(
            "\n{:<26} {}",
            "Dividend income:".bold(),
            format_currency(summary.dividend_income)
        ));
        output.push_str(&format!(
            "\n{:<26} {}",
            "Interest income:".bold(),
            format_currency(summary.interest_income)
        ));
        output.push_str(&format!(
            "\n{:<26} {}\n",
            "Realized lot matches:".bold(),
            summary.realized_count
        ));
    }

    output
}

/// Format realized events as an audit table
pub fn format_realized_table(year: i32, events: &[RealizedEvent]) -> String {
    if events.is_empty() {
        return format!("\n{} No realized gains or losses in {}\n", "ℹ".blue().bold(), year);
    }

    #[derive(Tabled)]
    struct RealizedRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Acquired")]
        acquired: String,
        #[tabled(rename = "Sold")]
        sold: String,
        #[tabled(rename = "Term")]
        term: &'static str,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Proceeds")]
        proceeds: String,
        #[tabled(rename = "Cost Basis")]
        cost_basis: String,
        #[tabled(rename = "Gain/Loss")]
        gain_loss: String,
    }

    let rows: Vec<RealizedRow> = events
        .iter()
        .map(|e| RealizedRow {
            symbol: e.symbol.clone(),
            acquired: e.lot_open_date.format("%Y-%m-%d").to_string(),
            sold: e.close_date.format("%Y-%m-%d").to_string(),
            term: e.term.as_str(),
            quantity: format_quantity(e.quantity_matched),
            proceeds: format_currency(e.proceeds),
            cost_basis: format_currency(e.cost_basis),
            gain_loss: colored_amount(e.gain_loss),
        })
        .collect();

    let total: Decimal = events.iter().map(|e| e.gain_loss).sum();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    // Right-align numeric columns (Quantity onwards)
    table.modify(Columns::new(4..), Alignment::right());

    format!(
        "\n{} Realized gains and losses {}\n\n{}\n\n{:<20} {}\n",
        "📊".cyan().bold(),
        year,
        table,
        "Total:".bold(),
        colored_amount(total)
    )
}

/// Format open lots
pub fn format_holdings_table(as_of: chrono::NaiveDate, lots: &[Lot]) -> String {
    if lots.is_empty() {
        return format!("\n{} No open lots as of {}\n", "ℹ".blue().bold(), as_of);
    }

    #[derive(Tabled)]
    struct LotRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Acquired")]
        acquired: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Unit Cost")]
        unit_cost: String,
        #[tabled(rename = "Cost Basis")]
        cost_basis: String,
    }

    let rows: Vec<LotRow> = lots
        .iter()
        .map(|lot| LotRow {
            symbol: lot.symbol.clone(),
            acquired: lot.open_date.format("%Y-%m-%d").to_string(),
            quantity: format_quantity(lot.remaining_quantity),
            unit_cost: format_currency(lot.unit_cost),
            cost_basis: format_currency(lot.remaining_cost),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());

    format!("\n{} Open lots as of {}\n\n{}\n", "📦".cyan().bold(), as_of, table)
}

/// Preview the first records of an import
pub fn format_import_preview(transactions: &[Transaction], limit: usize) -> String {
    #[derive(Tabled)]
    struct TransactionPreview {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Type")]
        kind: &'static str,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let preview: Vec<TransactionPreview> = transactions
        .iter()
        .take(limit)
        .map(|tx| TransactionPreview {
            date: tx.date.format("%Y-%m-%d").to_string(),
            symbol: tx.symbol.clone(),
            kind: tx.kind.as_str(),
            quantity: tx.quantity.map(format_quantity).unwrap_or_default(),
            price: tx.price.map(format_currency).unwrap_or_default(),
            amount: format_currency(tx.amount),
        })
        .collect();

    let mut output = Table::new(preview).with(Style::rounded()).to_string();
    if transactions.len() > limit {
        output.push_str(&format!(
            "\n\n... and {} more transactions",
            transactions.len() - limit
        ));
    }
    output
}

/// Import results, including the rows that were left out
pub fn format_import_result(stats: &ImportStats, skipped: &[SkippedRow]) -> String {
    let mut output = format!("\n{} Import complete!", "✓".green().bold());
    output.push_str(&format!("\n  Imported: {}", stats.imported.to_string().green()));
    if stats.duplicates > 0 {
        output.push_str(&format!(
            "\n  Skipped (duplicates): {}",
            stats.duplicates.to_string().yellow()
        ));
    }
    output.push_str(&format_skipped_rows(skipped));
    output.push('\n');
    output
}

pub fn format_skipped_rows(skipped: &[SkippedRow]) -> String {
    if skipped.is_empty() {
        return String::new();
    }

    let mut output = format!(
        "\n  Skipped (unsupported): {}",
        skipped.len().to_string().yellow()
    );
    for row in skipped {
        output.push_str(&format!(
            "\n    row {:>5}  {:<5} {:<8} {}",
            row.row, row.trans_code, row.instrument, row.reason
        ));
    }
    output
}
