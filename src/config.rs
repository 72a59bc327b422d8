//! Configuration loading
//!
//! Settings come from an optional TOML file. The file is looked up at
//! `$TAXLOT_CONFIG` when set, otherwise at `<config_home>/taxlot/config.toml`.
//! A missing file means defaults; a malformed one is an error.
//!
//! ```toml
//! database = "/home/me/taxes/trades.db"
//! date_basis = "settle"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which export date becomes the record date
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateBasis {
    /// Activity (trade) date
    #[default]
    Trade,
    /// Settlement date
    Settle,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Database file; defaults to ~/.taxlot/data.db
    pub database: Option<PathBuf>,
    pub date_basis: DateBasis,
}

impl Config {
    /// Load from the default location
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config =
            toml::from_str(&text).with_context(|| format!("Invalid config file {:?}", path))?;

        debug!("Loaded config from {:?}: {:?}", path, config);
        Ok(config)
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TAXLOT_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dir_spec::config_home().map(|dir| dir.join("taxlot").join("config.toml"))
}
