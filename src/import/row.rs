//! Row mapping and header validation

use std::collections::BTreeMap;

use tracing::warn;

use crate::models::CellValue;
use crate::schema::EntitySchema;

/// A data row keyed by header name
pub type RawRow = BTreeMap<String, CellValue>;

/// Pair each header with the cell in the same column
///
/// Empty headers drop their column, short rows pad with `Null`, and cells
/// beyond the last header are ignored.
pub fn map_row_to_object(headers: &[String], row: &[CellValue]) -> RawRow {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !header.is_empty())
        .map(|(i, header)| (header.clone(), row.get(i).cloned().unwrap_or_default()))
        .collect()
}

/// Outcome of comparing a header row against a schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCheck {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl HeaderCheck {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Compare trimmed headers with the schema's required and known fields
pub fn check_headers(schema: &EntitySchema, headers: &[String]) -> HeaderCheck {
    let present = |name: &str| headers.iter().any(|h| h.trim() == name);

    let missing = schema
        .required_headers()
        .into_iter()
        .filter(|name| !present(*name))
        .map(str::to_string)
        .collect();

    let unexpected: Vec<String> = headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && !schema.is_known_header(h))
        .map(str::to_string)
        .collect();

    if !unexpected.is_empty() {
        warn!(
            kind = %schema.kind,
            headers = ?unexpected,
            "Ignoring columns the schema does not know"
        );
    }

    HeaderCheck {
        missing,
        unexpected,
    }
}

/// A non-blank data row with its position in the sheet
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    /// 1-based position among the data rows, blank rows included
    pub number: usize,
    pub cells: RawRow,
}

/// Map every data row and drop the ones with nothing in them
pub fn extract_rows(headers: &[String], rows: &[Vec<CellValue>]) -> Vec<DataRow> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell.is_blank()))
        .map(|(i, row)| DataRow {
            number: i + 1,
            cells: map_row_to_object(headers, row),
        })
        .collect()
}
