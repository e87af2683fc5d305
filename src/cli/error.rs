//! CLI-specific error types

use crate::database::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("IO error: {0}")]
    IoError(String),
}
