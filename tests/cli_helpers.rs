#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

pub const HEADER: &str =
    "\"Activity Date\",\"Process Date\",\"Settle Date\",\"Instrument\",\"Description\",\"Trans Code\",\"Quantity\",\"Price\",\"Amount\"\n";

pub fn db_path(home: &TempDir) -> PathBuf {
    home.path().join(".taxlot").join("data.db")
}

/// Command isolated from the user's database and config
pub fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("taxlot"));
    cmd.env("HOME", home.path());
    cmd.env("TAXLOT_CONFIG", home.path().join("absent-config.toml"));
    cmd.env_remove("RUST_LOG");
    cmd.arg("--no-color");
    cmd
}

pub fn run_cmd(home: &TempDir, args: &[&str]) -> Result<Output> {
    let mut cmd = base_cmd(home);
    cmd.args(args);
    let output = cmd.output()?;
    if !output.status.success() {
        bail!(
            "command failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

pub fn run_json(home: &TempDir, args: &[&str]) -> Result<Value> {
    let mut with_json = vec!["--json"];
    with_json.extend_from_slice(args);
    let output = run_cmd(home, &with_json)?;
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Write an export file made of `rows` under the header line
pub fn write_export(home: &TempDir, name: &str, rows: &[&str]) -> Result<PathBuf> {
    let mut body = HEADER.to_string();
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    let path = home.path().join(name);
    std::fs::write(&path, body)?;
    Ok(path)
}

pub fn import(home: &TempDir, path: &std::path::Path) -> Result<Output> {
    let path = path.to_string_lossy().into_owned();
    run_cmd(home, &["import", path.as_str()])
}
