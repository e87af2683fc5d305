//! Batch store gateway
//!
//! Splits key and record lists into chunks that respect the store's per-call
//! ceilings, runs a bounded number of chunk calls at once, and retries
//! unprocessed items with exponential backoff. Nothing here fails as a whole:
//! every key or record ends up either served or listed with a reason.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::config::UploadConfig;
use super::{RecordStore, StoreError};
use crate::models::{EntityKind, Record};

/// Result of reading existing records
#[derive(Debug, Default)]
pub struct ReadOutcome {
    /// Stored records by key; a key missing here and from `failed` does not exist
    pub found: HashMap<String, Record>,
    /// Keys whose lookup could not be completed, with the last error seen
    pub failed: HashMap<String, String>,
    /// Store calls issued, retries included
    pub calls: usize,
}

/// Result of writing finalized records
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Keys the store confirmed
    pub written: Vec<String>,
    /// Keys still unprocessed after retries, with the last error seen
    pub failed: HashMap<String, String>,
    /// Store calls issued, retries included
    pub calls: usize,
}

struct ChunkRead {
    found: Vec<Record>,
    failed: Vec<(String, String)>,
    calls: usize,
}

struct ChunkWrite {
    written: Vec<String>,
    failed: Vec<(String, String)>,
    calls: usize,
}

/// Chunking, concurrency and retry on top of a [`RecordStore`]
pub struct BatchGateway<S: RecordStore> {
    store: S,
    config: UploadConfig,
}

impl<S: RecordStore> BatchGateway<S> {
    /// Create a new gateway over the given store
    pub fn new(store: S, config: UploadConfig) -> Self {
        Self { store, config }
    }

    /// Get reference to the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Number of read calls a lookup of `keys` takes without retries
    pub fn read_chunk_count(&self, keys: usize) -> usize {
        keys.div_ceil(self.config.batch.get_limit.max(1))
    }

    /// Number of write calls `records` take without retries
    pub fn write_chunk_count(&self, records: usize) -> usize {
        records.div_ceil(self.config.batch.size.max(1))
    }

    /// Read the stored records for `keys`
    pub async fn read_existing(&self, kind: EntityKind, keys: &[String]) -> ReadOutcome {
        let chunk_size = self.config.batch.get_limit.max(1);
        let concurrency = self.config.batch.max_concurrency.max(1);

        let chunks: Vec<ChunkRead> = stream::iter(keys.chunks(chunk_size))
            .map(|chunk| self.read_chunk(kind, chunk))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut outcome = ReadOutcome::default();
        for chunk in chunks {
            outcome.calls += chunk.calls;
            for record in chunk.found {
                if let Some(key) = record.key(kind) {
                    outcome.found.insert(key.to_string(), record);
                }
            }
            outcome.failed.extend(chunk.failed);
        }
        debug!(
            %kind,
            keys = keys.len(),
            found = outcome.found.len(),
            failed = outcome.failed.len(),
            calls = outcome.calls,
            "Batched read finished"
        );
        outcome
    }

    /// Write finalized records
    pub async fn write_records(&self, kind: EntityKind, records: &[Record]) -> WriteOutcome {
        let chunk_size = self.config.batch.size.max(1);
        let concurrency = self.config.batch.max_concurrency.max(1);

        let chunks: Vec<ChunkWrite> = stream::iter(records.chunks(chunk_size))
            .map(|chunk| self.write_chunk(kind, chunk))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut outcome = WriteOutcome::default();
        for chunk in chunks {
            outcome.calls += chunk.calls;
            outcome.written.extend(chunk.written);
            outcome.failed.extend(chunk.failed);
        }
        debug!(
            %kind,
            records = records.len(),
            written = outcome.written.len(),
            failed = outcome.failed.len(),
            calls = outcome.calls,
            "Batched write finished"
        );
        outcome
    }

    async fn read_chunk(&self, kind: EntityKind, chunk: &[String]) -> ChunkRead {
        let mut pending: Vec<String> = chunk.to_vec();
        let mut result = ChunkRead {
            found: Vec::new(),
            failed: Vec::new(),
            calls: 0,
        };
        let mut attempt = 0u32;

        loop {
            result.calls += 1;
            let reason = match self.store.batch_get(kind, &pending).await {
                Ok(output) => {
                    result.found.extend(output.records);
                    pending = output.unprocessed_keys;
                    if pending.is_empty() {
                        return result;
                    }
                    format!("{} keys left unprocessed", pending.len())
                }
                Err(e) if e.is_retryable() => e.to_string(),
                Err(e) => {
                    warn!(%kind, error = %e, "Batched read rejected");
                    result.failed = fail_all(pending, &e);
                    return result;
                }
            };

            if attempt >= self.config.retry.max_retries {
                warn!(%kind, keys = pending.len(), %reason, "Giving up on batched read");
                result.failed = pending.into_iter().map(|k| (k, reason.clone())).collect();
                return result;
            }
            self.pause(attempt, kind, "batch_get", &reason).await;
            attempt += 1;
        }
    }

    async fn write_chunk(&self, kind: EntityKind, chunk: &[Record]) -> ChunkWrite {
        let mut result = ChunkWrite {
            written: Vec::new(),
            failed: Vec::new(),
            calls: 0,
        };
        let mut pending: Vec<Record> = Vec::with_capacity(chunk.len());
        for record in chunk {
            match record.key(kind) {
                Some(_) => pending.push(record.clone()),
                None => result.failed.push((
                    String::new(),
                    format!("record has no {}", kind.key_field()),
                )),
            }
        }
        let mut attempt = 0u32;

        loop {
            result.calls += 1;
            let reason = match self.store.batch_write(kind, &pending).await {
                Ok(output) => {
                    let left: Vec<String> = output
                        .unprocessed
                        .iter()
                        .filter_map(|r| r.key(kind).map(str::to_string))
                        .collect();
                    result.written.extend(
                        pending
                            .iter()
                            .filter_map(|r| r.key(kind))
                            .filter(|k| !left.iter().any(|l| l == k))
                            .map(str::to_string),
                    );
                    pending = output.unprocessed;
                    if pending.is_empty() {
                        return result;
                    }
                    format!("{} items left unprocessed", pending.len())
                }
                Err(e) if e.is_retryable() => e.to_string(),
                Err(e) => {
                    warn!(%kind, error = %e, "Batched write rejected");
                    result.failed.extend(fail_all(record_keys(kind, &pending), &e));
                    return result;
                }
            };

            if attempt >= self.config.retry.max_retries {
                warn!(%kind, items = pending.len(), %reason, "Giving up on batched write");
                result.failed.extend(
                    record_keys(kind, &pending)
                        .into_iter()
                        .map(|k| (k, reason.clone())),
                );
                return result;
            }
            self.pause(attempt, kind, "batch_write", &reason).await;
            attempt += 1;
        }
    }

    async fn pause(&self, attempt: u32, kind: EntityKind, operation: &str, reason: &str) {
        let delay = self.config.retry.backoff(attempt);
        debug!(
            %kind,
            operation,
            attempt = attempt + 1,
            backoff_ms = delay.as_millis() as u64,
            reason,
            "Retrying store call"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn record_keys(kind: EntityKind, records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.key(kind).map(str::to_string))
        .collect()
}

fn fail_all(keys: Vec<String>, error: &StoreError) -> Vec<(String, String)> {
    let reason = error.to_string();
    keys.into_iter().map(|k| (k, reason.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;
    use crate::database::config::RetrySection;

    fn config(size: usize, get_limit: usize) -> UploadConfig {
        let mut config = UploadConfig::new();
        config.batch.size = size;
        config.batch.get_limit = get_limit;
        config.retry = RetrySection {
            max_retries: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        };
        config
    }

    fn games(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new().with("game_id", format!("G{i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_chunk_counts() {
        let gateway = BatchGateway::new(InMemoryStore::new(), config(25, 100));
        assert_eq!(gateway.read_chunk_count(0), 0);
        assert_eq!(gateway.read_chunk_count(100), 1);
        assert_eq!(gateway.read_chunk_count(101), 2);
        assert_eq!(gateway.write_chunk_count(51), 3);
    }

    #[tokio::test]
    async fn test_write_retries_unprocessed_items() {
        let gateway = BatchGateway::new(InMemoryStore::new(), config(5, 10));
        gateway.store().leave_unprocessed_writes(1);

        let outcome = gateway.write_records(EntityKind::Game, &games(5)).await;
        assert_eq!(outcome.written.len(), 5);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.calls, 2);
        assert_eq!(gateway.store().len(EntityKind::Game), 5);
    }

    #[tokio::test]
    async fn test_write_gives_up_after_retries() {
        let gateway = BatchGateway::new(InMemoryStore::new(), config(5, 10));
        gateway.store().reject_key("G3");

        let outcome = gateway.write_records(EntityKind::Game, &games(5)).await;
        assert_eq!(outcome.written.len(), 4);
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed["G3"].contains("unprocessed"));
        // first call plus three retries
        assert_eq!(outcome.calls, 4);
    }

    #[tokio::test]
    async fn test_read_retries_failed_calls() {
        let store = InMemoryStore::new();
        for record in games(3) {
            store.put(EntityKind::Game, record).unwrap();
        }
        store.fail_next_gets(2);
        let gateway = BatchGateway::new(store, config(25, 100));

        let keys: Vec<String> = vec!["G0".into(), "G2".into(), "G7".into()];
        let outcome = gateway.read_existing(EntityKind::Game, &keys).await;
        assert_eq!(outcome.found.len(), 2);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.calls, 3);
    }

    #[tokio::test]
    async fn test_read_exhaustion_marks_keys_failed() {
        let store = InMemoryStore::new();
        store.fail_next_gets(10);
        let gateway = BatchGateway::new(store, config(25, 2));

        let keys: Vec<String> = vec!["G0".into(), "G1".into()];
        let outcome = gateway.read_existing(EntityKind::Game, &keys).await;
        assert!(outcome.found.is_empty());
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome.failed["G0"].starts_with("Throttled"));
    }
}
