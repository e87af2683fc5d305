//! Bulk upload pipeline
//!
//! Turns one uploaded worksheet into upserts:
//! - `sheet`: payload decoding, format detection and worksheet parsing
//! - `row`: header validation and header/row zipping
//! - `builder`: conversion, validation and create/update finalization
//! - `reconcile`: batched existence lookup and create/update routing
//! - `upload`: the orchestrating engine and its report

pub mod builder;
pub mod reconcile;
pub mod row;
pub mod sheet;
pub mod upload;

use serde::{Deserialize, Serialize};

/// Upload-level failure; nothing has been written when one is returned
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum UploadError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Unreadable file: {0}")]
    UnreadableFile(String),
    #[error("Worksheet is empty")]
    EmptyWorksheet,
    #[error("Missing required headers: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),
    #[error("No data rows found")]
    NoDataRows,
    #[error("Too many records: {count} rows exceeds the limit of {max}")]
    TooManyRecords { count: usize, max: usize },
}

/// A single row that was skipped or could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// Result of an upload, as returned to the admin console
///
/// Row failures do not flip `success`; callers detect partial failure by
/// reading `errors` together with the counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use = "upload reports carry row errors that should be surfaced"]
pub struct UploadReport {
    pub success: bool,
    pub message: String,
    /// Rows that carried a primary key
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

impl UploadReport {
    /// Report for an upload that aborted before touching the store
    pub fn failure(error: &UploadError) -> Self {
        let message = error.to_string();
        Self {
            success: false,
            errors: vec![message.clone()],
            message,
            processed: 0,
            inserted: 0,
            updated: 0,
        }
    }

    /// Fold an engine result into the report shape
    pub fn from_result(result: Result<UploadReport, UploadError>) -> Self {
        match result {
            Ok(report) => report,
            Err(error) => Self::failure(&error),
        }
    }

    /// True when every row with a key was written
    pub fn is_complete(&self) -> bool {
        self.success && self.errors.is_empty()
    }
}

pub use builder::{BuiltRecord, PreparedBatch, PreparedRow, RecordBuilder, merge_for_update};
pub use reconcile::{Reconciliation, Route, reconcile};
pub use row::{DataRow, HeaderCheck, RawRow, check_headers, extract_rows, map_row_to_object};
pub use sheet::{CsvWorksheetParser, FileFormat, Worksheet, WorksheetParser};
pub use upload::UploadEngine;
