mod cli;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use colored::Colorize;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::formatters;
use cli::{Cli, Commands};
use taxlot::config::{Config, DateBasis};
use taxlot::tax::{generate_tax_report, load_open_lots, RealizedEvent};
use taxlot::{db, importers};

const PREVIEW_ROWS: usize = 10;

fn main() -> Result<()> {
    // Logs go to stderr so JSON on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load()?;
    let db_path = cli.db.clone().or_else(|| config.database.clone());

    match cli.command {
        Commands::Import { file, dry_run } => {
            handle_import(&file, dry_run, db_path, config.date_basis, cli.json)
        }
        Commands::Summary { years } => handle_summary(&years, db_path, cli.json),
        Commands::Realized { year, symbol } => {
            handle_realized(year, symbol.as_deref(), db_path, cli.json)
        }
        Commands::Holdings { as_of } => {
            let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
            handle_holdings(as_of, db_path, cli.json)
        }
    }
}

/// Open the database, creating the schema on first use
fn open_store(db_path: Option<PathBuf>) -> Result<Connection> {
    db::init_database(db_path.clone())?;
    db::open_db(db_path)
}

/// Handle import command
fn handle_import(
    file_path: &Path,
    dry_run: bool,
    db_path: Option<PathBuf>,
    date_basis: DateBasis,
    json: bool,
) -> Result<()> {
    info!("Importing transactions from: {:?}", file_path);

    let (transactions, skipped) = importers::import_file(file_path, date_basis)
        .with_context(|| format!("Failed to import {:?}", file_path))?;

    if json {
        if dry_run {
            println!("{}", formatters::format_json(&transactions));
            return Ok(());
        }
        let mut conn = open_store(db_path)?;
        let stats = importers::store_transactions(&mut conn, &transactions)?;
        println!(
            "{}",
            serde_json::json!({
                "found": transactions.len(),
                "imported": stats.imported,
                "duplicates": stats.duplicates,
                "skipped": skipped.len(),
            })
        );
        return Ok(());
    }

    println!(
        "\n{} Found {} transactions\n",
        "✓".green().bold(),
        transactions.len()
    );
    if !transactions.is_empty() {
        println!("{}", formatters::format_import_preview(&transactions, PREVIEW_ROWS));
    }

    if dry_run {
        print!("{}", formatters::format_skipped_rows(&skipped));
        println!("\n{} Dry run - no changes saved", "ℹ".blue().bold());
        return Ok(());
    }

    let mut conn = open_store(db_path)?;
    let stats = importers::store_transactions(&mut conn, &transactions)?;
    print!("{}", formatters::format_import_result(&stats, &skipped));

    Ok(())
}

fn handle_summary(years: &[i32], db_path: Option<PathBuf>, json: bool) -> Result<()> {
    let conn = open_store(db_path)?;
    let report = generate_tax_report(&conn, years)?;

    if json {
        println!("{}", formatters::format_json(&report.summaries));
    } else {
        print!("{}", formatters::format_summary_table(&report.summaries));
    }
    Ok(())
}

fn handle_realized(
    year: i32,
    symbol: Option<&str>,
    db_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let conn = open_store(db_path)?;

    if let Some(symbol) = symbol {
        let known = db::list_symbols(&conn)?;
        if !known.iter().any(|s| s.eq_ignore_ascii_case(symbol)) {
            bail!(
                "No transactions for symbol '{}'. Imported symbols: {}",
                symbol,
                if known.is_empty() { "none".to_string() } else { known.join(", ") }
            );
        }
    }

    let report = generate_tax_report(&conn, &[year])?;

    let events: Vec<RealizedEvent> = report
        .realized
        .into_iter()
        .filter(|e| symbol.map_or(true, |s| e.symbol.eq_ignore_ascii_case(s)))
        .collect();

    if json {
        println!("{}", formatters::format_json(&events));
    } else {
        print!("{}", formatters::format_realized_table(year, &events));
    }
    Ok(())
}

fn handle_holdings(as_of: NaiveDate, db_path: Option<PathBuf>, json: bool) -> Result<()> {
    let conn = open_store(db_path)?;
    let lots = load_open_lots(&conn, as_of)?;

    if json {
        println!("{}", formatters::format_json(&lots));
    } else {
        print!("{}", formatters::format_holdings_table(as_of, &lots));
    }
    Ok(())
}
