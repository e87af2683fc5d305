//! Record builder
//!
//! Works in two passes. `prepare` validates and converts a mapped row without
//! looking at the store. `finalize` runs once the stored record (if any) is
//! known and produces the record that will be written.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::RowError;
use super::row::{DataRow, RawRow};
use crate::convert::{self, convert_field, format_timestamp, validate_required_field};
use crate::models::{CellValue, EntityKind, FieldValue, Record, UpsertAction};
use crate::schema::{CREATED_AT, EntitySchema, SCRATCH_API, schema_for};

/// A row that passed validation and waits for reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    pub row: usize,
    pub key: String,
    /// Key plus every converted schema field
    pub record: Record,
    /// Server counters the upload supplied, used on insert only
    pub counters: Vec<(&'static str, f64)>,
}

/// Output of the first pass over all rows
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub rows: Vec<PreparedRow>,
    pub errors: Vec<RowError>,
    /// Rows that carried a primary key
    pub processed: usize,
}

impl PreparedBatch {
    pub fn keys(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.key.clone()).collect()
    }
}

/// A record ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRecord {
    pub row: usize,
    pub key: String,
    pub action: UpsertAction,
    pub record: Record,
}

/// Schema-driven row validation and record assembly for one kind
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    schema: &'static EntitySchema,
}

impl RecordBuilder {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            schema: schema_for(kind),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.schema.kind
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    /// Trimmed primary key of a mapped row, if there is one
    pub fn key_of(&self, cells: &RawRow) -> Option<String> {
        let key = convert::to_string(cell(cells, self.schema.key_field), "")
            .trim()
            .to_string();
        (!key.is_empty()).then_some(key)
    }

    /// Validate and convert one row
    pub fn prepare(&self, row: &DataRow) -> Result<PreparedRow, RowError> {
        let key_field = self.schema.key_field;
        let key = self
            .key_of(&row.cells)
            .ok_or_else(|| RowError::new(row.number, format!("Missing {}", key_field)))?;

        let mut record = Record::new().with(key_field, key.clone());
        for spec in self.schema.business_fields() {
            let value = cell(&row.cells, spec.name);
            if spec.required {
                let check = validate_required_field(value, spec.name);
                if let Some(error) = check.error {
                    return Err(RowError::new(row.number, error));
                }
            }
            record.insert(spec.name, convert_field(value, spec.field_type));
        }

        if self.kind() == EntityKind::Game {
            let url = record.get_str(SCRATCH_API).unwrap_or_default();
            if !scratch_api_matches(url, &key) {
                return Err(RowError::new(
                    row.number,
                    format!("scratch_api must end with game_id {}", key),
                ));
            }
        }

        let counters = self
            .schema
            .server_counters
            .iter()
            .filter_map(|&name| {
                let value = cell(&row.cells, name);
                (!value.is_blank()).then(|| (name, convert::to_number(value, 0.0)))
            })
            .collect();

        Ok(PreparedRow {
            row: row.number,
            key,
            record,
            counters,
        })
    }

    /// First pass over every data row; no store access
    pub fn prepare_rows(&self, rows: &[DataRow]) -> PreparedBatch {
        let mut batch = PreparedBatch::default();
        let mut first_seen: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let Some(key) = self.key_of(&row.cells) else {
                batch.errors.push(RowError::new(
                    row.number,
                    format!("Missing {}", self.schema.key_field),
                ));
                continue;
            };
            batch.processed += 1;

            if let Some(first) = first_seen.get(&key) {
                batch.errors.push(RowError::new(
                    row.number,
                    format!(
                        "Duplicate {} {} (first seen in row {})",
                        self.schema.key_field, key, first
                    ),
                ));
                continue;
            }
            // Only rows that will be written claim their key
            match self.prepare(row) {
                Ok(prepared) => {
                    first_seen.insert(key, row.number);
                    batch.rows.push(prepared);
                }
                Err(error) => batch.errors.push(error),
            }
        }

        debug!(
            kind = %self.kind(),
            rows = rows.len(),
            prepared = batch.rows.len(),
            rejected = batch.errors.len(),
            "Prepared rows"
        );
        batch
    }

    /// Second pass: build the record to write
    pub fn finalize(
        &self,
        prepared: PreparedRow,
        existing: Option<&Record>,
        now: DateTime<Utc>,
    ) -> BuiltRecord {
        match existing {
            None => self.create(prepared, now),
            Some(stored) => self.update(prepared, stored, now),
        }
    }

    fn create(&self, prepared: PreparedRow, now: DateTime<Utc>) -> BuiltRecord {
        let stamp = format_timestamp(now);
        let mut record = prepared.record;

        for &name in self.schema.server_counters {
            let seeded = prepared
                .counters
                .iter()
                .find(|(n, _)| *n == name)
                .map_or(0.0, |(_, v)| *v);
            record.insert(name, seeded);
        }
        record.insert(CREATED_AT, stamp.clone());
        for &touch in self.schema.touch_fields {
            record.insert(touch, stamp.clone());
        }

        BuiltRecord {
            row: prepared.row,
            key: prepared.key,
            action: UpsertAction::Insert,
            record,
        }
    }

    fn update(&self, prepared: PreparedRow, stored: &Record, now: DateTime<Utc>) -> BuiltRecord {
        let changed = has_business_change(self.schema, stored, &prepared.record);
        let mut record = merge_for_update(self.kind(), stored, &prepared.record);

        let stamp = format_timestamp(now);
        for &touch in self.schema.touch_fields {
            if changed || !record.contains(touch) {
                record.insert(touch, stamp.clone());
            }
        }

        BuiltRecord {
            row: prepared.row,
            key: prepared.key,
            action: if changed {
                UpsertAction::Update
            } else {
                UpsertAction::Unchanged
            },
            record,
        }
    }
}

/// Overlay the whitelisted business fields of `incoming` onto `existing`
///
/// Server-owned fields and attributes outside the schema are carried over
/// from `existing` untouched. A counter the stored record lacks starts at 0.
/// Timestamps are left to the caller.
pub fn merge_for_update(kind: EntityKind, existing: &Record, incoming: &Record) -> Record {
    let schema = schema_for(kind);
    let mut merged = existing.clone();

    for spec in schema.business_fields() {
        if let Some(value) = incoming.get(spec.name) {
            merged.insert(spec.name, value.clone());
        }
    }
    for &counter in schema.server_counters {
        if !merged.contains(counter) {
            merged.insert(counter, FieldValue::Number(0.0));
        }
    }
    merged
}

/// Whether any business field of `incoming` differs from the stored value
pub fn has_business_change(schema: &EntitySchema, stored: &Record, incoming: &Record) -> bool {
    schema
        .business_fields()
        .any(|spec| incoming.get(spec.name) != stored.get(spec.name))
}

fn cell<'a>(cells: &'a RawRow, name: &str) -> &'a CellValue {
    static NULL: CellValue = CellValue::Null;
    cells.get(name).unwrap_or(&NULL)
}

/// The last path segment of a project URL must be the game id
fn scratch_api_matches(url: &str, game_id: &str) -> bool {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url[..end].trim().trim_end_matches('/');
    path.rsplit('/').next() == Some(game_id)
}
