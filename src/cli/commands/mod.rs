//! CLI command implementations

pub mod click;
pub mod config;
pub mod upload;

use std::path::Path;

use crate::cli::error::CliError;
use crate::database::UploadConfig;

/// Load settings from a directory, or from the environment alone
fn load_config(dir: Option<&Path>) -> Result<UploadConfig, CliError> {
    let config = match dir {
        Some(dir) => UploadConfig::load(dir)?,
        None => UploadConfig::from_env()?,
    };
    Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}
