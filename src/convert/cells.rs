//! Cell converters
//!
//! Total functions from a [`CellValue`] to the canonical type of a schema
//! field. None of them fail: anything unusable collapses to the caller's
//! default, so a malformed cell can only ever produce a row-level outcome.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CellValue, FieldType, FieldValue};

/// Latest spreadsheet serial day number (9999-12-31)
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// What `to_date_string` returns when the input is not a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFallback {
    /// Use this instant instead
    Now(DateTime<Utc>),
    /// Return an empty string
    Empty,
    /// Return the input as text
    Raw,
}

/// Outcome of a required-field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Format an instant the way every stored timestamp is written
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_number(n: f64) -> String {
    // f64's Display already drops a trailing ".0" for integral values
    format!("{}", n)
}

/// Convert to a string; numbers and booleans stringify canonically
pub fn to_string(value: &CellValue, default: &str) -> String {
    match value {
        CellValue::Null => default.to_string(),
        CellValue::String(s) if s.is_empty() => default.to_string(),
        CellValue::String(s) => s.clone(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Boolean(b) => b.to_string(),
        CellValue::Array(items) => items
            .iter()
            .map(|item| to_string(item, ""))
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Convert to a finite number
pub fn to_number(value: &CellValue, default: f64) -> f64 {
    let parsed = match value {
        CellValue::Number(n) => Some(*n),
        CellValue::String(s) => s.trim().parse::<f64>().ok(),
        CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        CellValue::Null | CellValue::Array(_) => None,
    };
    match parsed {
        Some(n) if n.is_finite() => n,
        _ => default,
    }
}

/// Convert to a boolean; only "true", "1" and "yes" (any case) are truthy strings
pub fn to_boolean(value: &CellValue, default: bool) -> bool {
    match value {
        CellValue::Null => default,
        CellValue::Boolean(b) => *b,
        CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
        CellValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return default;
            }
            matches!(trimmed.to_lowercase().as_str(), "true" | "1" | "yes")
        }
        CellValue::Array(_) => false,
    }
}

fn json_element_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Convert to a list of strings
///
/// String cells holding a JSON array are split element-wise; any other
/// non-empty string becomes a one-element list.
pub fn to_string_array(value: &CellValue, default: &[String]) -> Vec<String> {
    match value {
        CellValue::Null => default.to_vec(),
        CellValue::Array(items) => items.iter().map(|item| to_string(item, "")).collect(),
        CellValue::String(s) => {
            if s.trim().is_empty() {
                return default.to_vec();
            }
            match serde_json::from_str::<serde_json::Value>(s) {
                Ok(serde_json::Value::Array(items)) => {
                    items.iter().map(json_element_to_string).collect()
                }
                _ => vec![s.clone()],
            }
        }
        CellValue::Number(_) | CellValue::Boolean(_) => vec![to_string(value, "")],
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

fn serial_day_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial <= 0.0 || serial > MAX_SERIAL_DAY {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch
        .checked_add_signed(Duration::milliseconds(millis))
        .map(|naive| naive.and_utc())
}

/// Parse a date-like cell
///
/// Accepts RFC 3339, a handful of common spreadsheet text layouts, and
/// numeric serial day numbers (days since 1899-12-30).
pub fn parse_date(value: &CellValue) -> Option<DateTime<Utc>> {
    match value {
        CellValue::String(s) => parse_date_text(s.trim()),
        CellValue::Number(n) => serial_day_to_datetime(*n),
        _ => None,
    }
}

/// Convert to an ISO-8601 timestamp with millisecond precision
pub fn to_date_string(value: &CellValue, fallback: DateFallback) -> String {
    match parse_date(value) {
        Some(instant) => format_timestamp(instant),
        None => match fallback {
            DateFallback::Now(now) => format_timestamp(now),
            DateFallback::Empty => String::new(),
            DateFallback::Raw => to_string(value, ""),
        },
    }
}

/// Check that a required cell carries a value
///
/// `0` and `false` count as present; only null and blank strings are missing.
pub fn validate_required_field(value: &CellValue, name: &str) -> FieldCheck {
    if value.is_blank() {
        FieldCheck {
            valid: false,
            error: Some(format!("Missing {}", name)),
        }
    } else {
        FieldCheck {
            valid: true,
            error: None,
        }
    }
}

/// Convert a cell to the declared type with the schema defaults
pub fn convert_field(value: &CellValue, field_type: FieldType) -> FieldValue {
    match field_type {
        FieldType::String => FieldValue::String(to_string(value, "")),
        FieldType::Number => FieldValue::Number(to_number(value, 0.0)),
        FieldType::Boolean => FieldValue::Boolean(to_boolean(value, false)),
        FieldType::StringArray => FieldValue::StringArray(to_string_array(value, &[])),
        FieldType::Date => FieldValue::String(to_date_string(value, DateFallback::Empty)),
    }
}
