use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taxlot::utils::{parse_as_of_date, parse_tax_year};

pub mod formatters;

#[derive(Parser)]
#[command(name = "taxlot")]
#[command(
    version,
    about = "Capital gains and income tax summary from brokerage trade history"
)]
#[command(
    long_about = "Import a brokerage activity export, then compute short-term and long-term capital gains (FIFO lot matching) plus dividend and interest income per tax year."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Database file (defaults to ~/.taxlot/data.db)
    #[arg(long = "db", global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import transactions from a brokerage CSV export
    Import {
        /// Path to the CSV file
        file: PathBuf,

        /// Preview only, don't save to database
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show capital gains and income totals for one or more tax years
    Summary {
        /// Tax years (e.g., 2023 2024)
        #[arg(required = true, value_parser = parse_tax_year)]
        years: Vec<i32>,
    },

    /// List realized gains and losses closed in a tax year
    Realized {
        /// Tax year (e.g., 2023)
        #[arg(value_parser = parse_tax_year)]
        year: i32,

        /// Only show this symbol
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Show lots still open on a date
    Holdings {
        /// Date (YYYY-MM-DD, or YYYY for December 31); defaults to today
        #[arg(long = "as-of", value_parser = parse_as_of_date)]
        as_of: Option<chrono::NaiveDate>,
    },
}
