//! Tabular Upsert SDK - bulk spreadsheet uploads into a key-value record store
//!
//! Provides:
//! - Cell conversion from untyped worksheet values to typed fields
//! - Per-kind schemas for students, teachers and games
//! - A two-pass record builder that preserves server-owned fields on update
//! - Batched, retried store access behind the `RecordStore` trait
//! - An upload engine returning a partial-success report
//!
//! ```rust
//! use tabular_upsert_sdk::{EntityKind, InMemoryStore, UploadConfig, UploadEngine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = UploadEngine::new(InMemoryStore::new(), UploadConfig::new());
//! let csv = b"student_id,name\nS1,Ann\nS2,Ben\n";
//! let report = engine
//!     .upload_file(EntityKind::Student, csv, Some("students.csv"))
//!     .await
//!     .unwrap();
//! assert_eq!(report.inserted, 2);
//! # }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod convert;
pub mod database;
pub mod import;
pub mod models;
pub mod schema;

// Re-export commonly used types
pub use database::{
    BatchGateway, InMemoryStore, RecordStore, StoreError, StoreResult, UploadConfig, record_click,
};
pub use import::{
    CsvWorksheetParser, FileFormat, RowError, UploadEngine, UploadError, UploadReport, Worksheet,
    WorksheetParser, merge_for_update,
};
pub use models::enums::*;
pub use models::{CellValue, FieldValue, Record};
pub use schema::{EntitySchema, FieldSpec, schema_for};
