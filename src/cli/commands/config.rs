//! Configuration CLI commands

use std::path::PathBuf;

use super::load_config;
use crate::cli::error::CliError;
use crate::database::config::sample_config;

/// Print a commented sample `.tabular-upsert.toml`
pub fn handle_sample_config() -> Result<(), CliError> {
    print!("{}", sample_config());
    Ok(())
}

/// Print the effective settings after file and environment overrides
pub fn handle_show_config(dir: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(dir.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}
