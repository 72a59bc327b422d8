//! Taxlot - capital gains and income summaries from brokerage trade history
//!
//! This library imports brokerage activity exports, stores normalized
//! records in SQLite, and computes per-year short-term and long-term capital
//! gains using first-in-first-out lot matching, alongside dividend and
//! interest income totals.

pub mod config;
pub mod db;
pub mod error;
pub mod importers;
pub mod tax;
pub mod utils;
