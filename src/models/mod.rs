//! Models module for the SDK
//!
//! Defines the cell boundary type, the typed record stored per entity, and
//! the enums shared by the schema registry and the upload pipeline.

pub mod cell;
pub mod enums;
pub mod record;

pub use cell::CellValue;
pub use enums::*;
pub use record::{FieldValue, Record};
