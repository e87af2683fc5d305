//! Cell conversion module
//!
//! Provides the total converters that turn untyped worksheet cells into the
//! typed field values the schema registry declares.

pub mod cells;

pub use cells::{
    DateFallback, FieldCheck, convert_field, format_timestamp, parse_date, to_boolean,
    to_date_string, to_number, to_string, to_string_array, validate_required_field,
};
