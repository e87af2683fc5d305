//! Worksheet intake
//!
//! Decodes the transported payload, recognises the file format and hands the
//! bytes to a [`WorksheetParser`]. CSV is parsed in-crate; workbook formats
//! are parsed by whatever implementation the host registers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::UploadError;
use crate::convert;
use crate::models::CellValue;

const XLSX_MAGIC: &[u8] = b"PK\x03\x04";
const XLS_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Recognised upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Xlsx,
    Xls,
    Csv,
}

impl FileFormat {
    /// Pick a format from the file name, falling back to the leading bytes
    pub fn detect(file_name: Option<&str>, bytes: &[u8]) -> Result<Self, UploadError> {
        if let Some(name) = file_name
            && let Some((_, ext)) = name.rsplit_once('.')
        {
            return match ext.to_lowercase().as_str() {
                "xlsx" | "xlsm" => Ok(FileFormat::Xlsx),
                "xls" => Ok(FileFormat::Xls),
                "csv" | "txt" => Ok(FileFormat::Csv),
                other => Err(UploadError::UnsupportedFormat(format!(".{}", other))),
            };
        }

        if bytes.starts_with(XLSX_MAGIC) {
            Ok(FileFormat::Xlsx)
        } else if bytes.starts_with(XLS_MAGIC) {
            Ok(FileFormat::Xls)
        } else {
            Ok(FileFormat::Csv)
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Xlsx => write!(f, "xlsx"),
            FileFormat::Xls => write!(f, "xls"),
            FileFormat::Csv => write!(f, "csv"),
        }
    }
}

/// One worksheet in row-major form; the first row is the header row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub rows: Vec<Vec<CellValue>>,
}

impl Worksheet {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Build from rows of JSON values, as produced by most sheet readers
    pub fn from_json_rows(rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(CellValue::from).collect())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header names, trimmed
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|cell| convert::to_string(cell, "").trim().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Everything below the header row
    pub fn data_rows(&self) -> &[Vec<CellValue>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// Turns file bytes into a worksheet
pub trait WorksheetParser: Send + Sync {
    /// Whether this parser reads the given format
    fn supports(&self, format: FileFormat) -> bool;

    /// Parse the first worksheet of the file
    fn parse(&self, bytes: &[u8], format: FileFormat) -> Result<Worksheet, UploadError>;
}

/// Comma-separated text reader
#[derive(Debug, Clone, Copy)]
pub struct CsvWorksheetParser {
    delimiter: u8,
}

impl Default for CsvWorksheetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvWorksheetParser {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Use a different field delimiter, e.g. `b';'` for European exports
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl WorksheetParser for CsvWorksheetParser {
    fn supports(&self, format: FileFormat) -> bool {
        format == FileFormat::Csv
    }

    fn parse(&self, bytes: &[u8], _format: FileFormat) -> Result<Worksheet, UploadError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| UploadError::UnreadableFile(e.to_string()))?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            CellValue::Null
                        } else {
                            CellValue::String(field.to_string())
                        }
                    })
                    .collect(),
            );
        }
        Ok(Worksheet::new(rows))
    }
}

/// Decode a base64 payload, tolerating a `data:...;base64,` prefix
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, UploadError> {
    let body = match payload.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => payload,
    };
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(UploadError::InvalidPayload("payload is empty".to_string()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| UploadError::InvalidPayload(e.to_string()))
}
