//! Upload engine
//!
//! Drives one upload from payload to report:
//! decode, parse, validate headers, extract rows, prepare, read existing,
//! finalize, write, report. Every structural check runs before the first
//! store call, so a rejected upload never mutates anything.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::builder::RecordBuilder;
use super::reconcile::reconcile;
use super::row::{check_headers, extract_rows};
use super::sheet::{CsvWorksheetParser, FileFormat, Worksheet, WorksheetParser, decode_payload};
use super::{RowError, UploadError, UploadReport};
use crate::database::{BatchGateway, RecordStore, UploadConfig};
use crate::models::{EntityKind, Record, UpsertAction};

/// Bulk upsert engine over a record store
pub struct UploadEngine<S: RecordStore> {
    gateway: BatchGateway<S>,
    parsers: Vec<Box<dyn WorksheetParser>>,
}

impl<S: RecordStore> UploadEngine<S> {
    /// Create an engine that reads CSV out of the box
    pub fn new(store: S, config: UploadConfig) -> Self {
        Self {
            gateway: BatchGateway::new(store, config),
            parsers: vec![Box::new(CsvWorksheetParser::new())],
        }
    }

    /// Register a parser; it is tried before the ones already registered
    pub fn with_parser(mut self, parser: impl WorksheetParser + 'static) -> Self {
        self.parsers.insert(0, Box::new(parser));
        self
    }

    /// Get reference to the underlying store
    pub fn store(&self) -> &S {
        self.gateway.store()
    }

    pub fn config(&self) -> &UploadConfig {
        self.gateway.config()
    }

    /// Upload a base64-encoded file
    pub async fn upload_base64(
        &self,
        kind: EntityKind,
        payload: &str,
        file_name: Option<&str>,
    ) -> Result<UploadReport, UploadError> {
        let bytes = decode_payload(payload)?;
        self.upload_file(kind, &bytes, file_name).await
    }

    /// Upload raw file bytes
    pub async fn upload_file(
        &self,
        kind: EntityKind,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> Result<UploadReport, UploadError> {
        let sheet = self.parse(bytes, file_name)?;
        self.upload_worksheet(kind, &sheet).await
    }

    /// Upload an already parsed worksheet
    pub async fn upload_worksheet(
        &self,
        kind: EntityKind,
        sheet: &Worksheet,
    ) -> Result<UploadReport, UploadError> {
        self.upload_worksheet_at(kind, sheet, Utc::now()).await
    }

    /// Upload a worksheet using `now` for every timestamp written
    pub async fn upload_worksheet_at(
        &self,
        kind: EntityKind,
        sheet: &Worksheet,
        now: DateTime<Utc>,
    ) -> Result<UploadReport, UploadError> {
        let upload_id = Uuid::new_v4();
        let span = info_span!("upload", %upload_id, %kind);
        self.run(kind, sheet, now).instrument(span).await
    }

    fn parse(&self, bytes: &[u8], file_name: Option<&str>) -> Result<Worksheet, UploadError> {
        let format = FileFormat::detect(file_name, bytes)?;
        let parser = self
            .parsers
            .iter()
            .find(|p| p.supports(format))
            .ok_or_else(|| UploadError::UnsupportedFormat(format.to_string()))?;
        debug!(%format, bytes = bytes.len(), "Parsing worksheet");
        parser.parse(bytes, format)
    }

    async fn run(
        &self,
        kind: EntityKind,
        sheet: &Worksheet,
        now: DateTime<Utc>,
    ) -> Result<UploadReport, UploadError> {
        let start = std::time::Instant::now();
        let builder = RecordBuilder::new(kind);

        if sheet.is_empty() {
            return Err(UploadError::EmptyWorksheet);
        }
        let headers = sheet.headers();
        let header_check = check_headers(builder.schema(), &headers);
        if !header_check.is_valid() {
            warn!(missing = ?header_check.missing, "Rejecting upload");
            return Err(UploadError::MissingHeaders(header_check.missing));
        }

        let rows = extract_rows(&headers, sheet.data_rows());
        if rows.is_empty() {
            return Err(UploadError::NoDataRows);
        }
        let max = self.config().batch.max_records;
        if rows.len() > max {
            warn!(rows = rows.len(), max, "Rejecting upload");
            return Err(UploadError::TooManyRecords {
                count: rows.len(),
                max,
            });
        }
        info!(rows = rows.len(), "Upload accepted");

        let prepared = builder.prepare_rows(&rows);
        let processed = prepared.processed;
        let mut errors = prepared.errors;

        let reconciliation = reconcile(&self.gateway, kind, prepared.rows).await;
        errors.extend(reconciliation.errors.iter().cloned());
        let built = reconciliation.finalize(&builder, now);

        let records: Vec<Record> = built.iter().map(|b| b.record.clone()).collect();
        let (mut inserted, mut updated) = (0, 0);
        if !records.is_empty() {
            let outcome = self.gateway.write_records(kind, &records).await;
            let written: HashSet<&str> = outcome.written.iter().map(String::as_str).collect();
            for item in &built {
                if written.contains(item.key.as_str()) {
                    match item.action {
                        UpsertAction::Insert => inserted += 1,
                        UpsertAction::Update | UpsertAction::Unchanged => updated += 1,
                    }
                } else {
                    let reason = outcome
                        .failed
                        .get(&item.key)
                        .map_or("not confirmed by store", String::as_str);
                    errors.push(RowError::new(
                        item.row,
                        format!("Failed to write record: {}", reason),
                    ));
                }
            }
        }

        errors.sort_by_key(|e| e.row);
        let report = UploadReport {
            success: true,
            message: format!(
                "Upload complete: {} processed, {} inserted, {} updated, {} errors",
                processed,
                inserted,
                updated,
                errors.len()
            ),
            processed,
            inserted,
            updated,
            errors: errors.iter().map(ToString::to_string).collect(),
        };

        info!(
            processed,
            inserted,
            updated,
            errors = report.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Upload finished"
        );
        Ok(report)
    }
}
