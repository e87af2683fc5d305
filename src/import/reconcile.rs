//! Create/update routing
//!
//! One batched existence lookup for every prepared row, then each row is
//! routed to the create or the update path. A key whose lookup could not be
//! completed is reported rather than treated as new, since inserting it would
//! reset the stored counters and `created_at`.

use chrono::{DateTime, Utc};

use super::RowError;
use super::builder::{BuiltRecord, PreparedRow, RecordBuilder};
use crate::database::{BatchGateway, RecordStore};
use crate::models::{EntityKind, Record};

/// Where a prepared row goes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Create(PreparedRow),
    Update(PreparedRow, Record),
}

impl Route {
    pub fn row(&self) -> usize {
        match self {
            Route::Create(p) | Route::Update(p, _) => p.row,
        }
    }
}

/// Routed rows plus rows whose lookup failed
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub routes: Vec<Route>,
    pub errors: Vec<RowError>,
    /// Store read calls issued, retries included
    pub read_calls: usize,
}

impl Reconciliation {
    /// Run the second builder pass over every routed row
    pub fn finalize(self, builder: &RecordBuilder, now: DateTime<Utc>) -> Vec<BuiltRecord> {
        self.routes
            .into_iter()
            .map(|route| match route {
                Route::Create(prepared) => builder.finalize(prepared, None, now),
                Route::Update(prepared, stored) => builder.finalize(prepared, Some(&stored), now),
            })
            .collect()
    }
}

/// Look up every prepared key in batches and route the rows
pub async fn reconcile<S: RecordStore>(
    gateway: &BatchGateway<S>,
    kind: EntityKind,
    rows: Vec<PreparedRow>,
) -> Reconciliation {
    if rows.is_empty() {
        return Reconciliation::default();
    }

    let keys: Vec<String> = rows.iter().map(|r| r.key.clone()).collect();
    let mut lookup = gateway.read_existing(kind, &keys).await;

    let mut result = Reconciliation {
        read_calls: lookup.calls,
        ..Default::default()
    };
    for prepared in rows {
        if let Some(reason) = lookup.failed.remove(&prepared.key) {
            result.errors.push(RowError::new(
                prepared.row,
                format!("Failed to read existing record: {}", reason),
            ));
            continue;
        }
        match lookup.found.remove(&prepared.key) {
            Some(stored) => result.routes.push(Route::Update(prepared, stored)),
            None => result.routes.push(Route::Create(prepared)),
        }
    }
    result
}
