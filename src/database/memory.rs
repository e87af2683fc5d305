//! In-memory record store
//!
//! Behaves like a managed key-value table: per-call item ceilings are
//! enforced, increments are atomic, and faults can be injected so the retry
//! and partial-write paths of the gateway can be driven deterministically.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BatchGetOutput, BatchWriteOutput, RecordStore, StoreError, StoreResult};
use crate::models::{EntityKind, FieldValue, Record};

/// Keys accepted by one `batch_get` call
pub const STORE_GET_LIMIT: usize = 100;

/// Items accepted by one `batch_write` call
pub const STORE_WRITE_LIMIT: usize = 25;

/// Serializable copy of every table
pub type Snapshot = BTreeMap<EntityKind, Vec<Record>>;

#[derive(Default)]
struct Faults {
    /// Upcoming `batch_get` calls that fail outright
    failing_gets: usize,
    /// Upcoming `batch_write` calls that fail outright
    failing_writes: usize,
    /// Upcoming `batch_write` calls that leave their last item unprocessed
    partial_writes: usize,
    /// Upcoming `batch_get` calls that leave their last key unprocessed
    partial_gets: usize,
    /// Keys that are never persisted by `batch_write`
    stuck_keys: HashSet<String>,
}

/// Store kept entirely in process memory
pub struct InMemoryStore {
    tables: Mutex<HashMap<EntityKind, BTreeMap<String, Record>>>,
    faults: Mutex<Faults>,
    get_limit: usize,
    write_limit: usize,
    get_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store with the provider's default call limits
    pub fn new() -> Self {
        Self::with_limits(STORE_GET_LIMIT, STORE_WRITE_LIMIT)
    }

    /// Create an empty store with custom per-call limits
    pub fn with_limits(get_limit: usize, write_limit: usize) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            get_limit,
            write_limit,
            get_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Build a store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        let store = Self::new();
        for (kind, records) in snapshot {
            for record in records {
                store.put(kind, record)?;
            }
        }
        Ok(store)
    }

    /// Load a JSON snapshot file; a missing file yields an empty store
    pub fn load_json(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::IoError(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse snapshot: {}", e))
        })?;
        Self::from_snapshot(snapshot)
    }

    /// Write every table to a JSON snapshot file
    pub fn save_json(&self, path: &Path) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(&self.snapshot()?).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize snapshot: {}", e))
        })?;
        std::fs::write(path, content)
            .map_err(|e| StoreError::IoError(format!("Failed to write snapshot: {}", e)))
    }

    /// Copy every table out
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let tables = self.lock_tables()?;
        Ok(tables
            .iter()
            .map(|(kind, rows)| (*kind, rows.values().cloned().collect()))
            .collect())
    }

    /// Insert or replace a record directly, bypassing call accounting
    pub fn put(&self, kind: EntityKind, record: Record) -> StoreResult<()> {
        let key = record
            .key(kind)
            .ok_or_else(|| {
                StoreError::InvalidInput(format!("record has no {}", kind.key_field()))
            })?
            .to_string();
        self.lock_tables()?
            .entry(kind)
            .or_default()
            .insert(key, record);
        Ok(())
    }

    /// Fetch a record directly, bypassing call accounting
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<Record> {
        self.tables
            .lock()
            .ok()
            .and_then(|tables| tables.get(&kind).and_then(|rows| rows.get(key)).cloned())
    }

    /// Number of records stored for a kind
    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.get(&kind).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }

    /// `batch_get` calls served so far
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// `batch_write` calls served so far
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Make the next `count` reads fail with a retryable error
    pub fn fail_next_gets(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_gets += count;
        }
    }

    /// Make the next `count` writes fail with a retryable error
    pub fn fail_next_writes(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_writes += count;
        }
    }

    /// Make the next `count` writes leave their last item unprocessed
    pub fn leave_unprocessed_writes(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.partial_writes += count;
        }
    }

    /// Make the next `count` reads leave their last key unprocessed
    pub fn leave_unprocessed_gets(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.partial_gets += count;
        }
    }

    /// Never persist the record with this key
    pub fn reject_key(&self, key: impl Into<String>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.stuck_keys.insert(key.into());
        }
    }

    fn lock_tables(
        &self,
    ) -> StoreResult<std::sync::MutexGuard<'_, HashMap<EntityKind, BTreeMap<String, Record>>>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::RequestFailed("store lock poisoned".to_string()))
    }

    fn lock_faults(&self) -> StoreResult<std::sync::MutexGuard<'_, Faults>> {
        self.faults
            .lock()
            .map_err(|_| StoreError::RequestFailed("store lock poisoned".to_string()))
    }
}

/// Take one pending fault from a counter
fn take(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn batch_get(&self, kind: EntityKind, keys: &[String]) -> StoreResult<BatchGetOutput> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if keys.len() > self.get_limit {
            return Err(StoreError::LimitExceeded {
                operation: "batch_get",
                limit: self.get_limit,
                requested: keys.len(),
            });
        }

        let (served, unprocessed_keys) = {
            let mut faults = self.lock_faults()?;
            if take(&mut faults.failing_gets) {
                return Err(StoreError::Throttled("read capacity exceeded".to_string()));
            }
            if keys.len() > 1 && take(&mut faults.partial_gets) {
                let (head, tail) = keys.split_at(keys.len() - 1);
                (head, tail.to_vec())
            } else {
                (keys, Vec::new())
            }
        };

        let tables = self.lock_tables()?;
        let records = match tables.get(&kind) {
            Some(rows) => served
                .iter()
                .filter_map(|key| rows.get(key).cloned())
                .collect(),
            None => Vec::new(),
        };

        Ok(BatchGetOutput {
            records,
            unprocessed_keys,
        })
    }

    async fn batch_write(
        &self,
        kind: EntityKind,
        records: &[Record],
    ) -> StoreResult<BatchWriteOutput> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if records.len() > self.write_limit {
            return Err(StoreError::LimitExceeded {
                operation: "batch_write",
                limit: self.write_limit,
                requested: records.len(),
            });
        }

        let mut unprocessed = Vec::new();
        let mut accepted = Vec::with_capacity(records.len());
        {
            let mut faults = self.lock_faults()?;
            if take(&mut faults.failing_writes) {
                return Err(StoreError::Throttled("write capacity exceeded".to_string()));
            }
            let drop_last = records.len() > 1 && take(&mut faults.partial_writes);
            for (i, record) in records.iter().enumerate() {
                let key = record.key(kind).ok_or_else(|| {
                    StoreError::InvalidInput(format!("record has no {}", kind.key_field()))
                })?;
                let stuck = faults.stuck_keys.contains(key);
                if stuck || (drop_last && i == records.len() - 1) {
                    unprocessed.push(record.clone());
                } else {
                    accepted.push((key.to_string(), record.clone()));
                }
            }
        }

        let mut tables = self.lock_tables()?;
        let table = tables.entry(kind).or_default();
        for (key, record) in accepted {
            table.insert(key, record);
        }

        Ok(BatchWriteOutput { unprocessed })
    }

    async fn increment_counter(
        &self,
        kind: EntityKind,
        key: &str,
        field: &str,
        delta: f64,
    ) -> StoreResult<f64> {
        let mut tables = self.lock_tables()?;
        let record = tables
            .get_mut(&kind)
            .and_then(|rows| rows.get_mut(key))
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, key)))?;
        let current = record.get_number(field).unwrap_or(0.0);
        let next = current + delta;
        record.insert(field, FieldValue::Number(next));
        Ok(next)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
