//! Key-value store abstraction for bulk upserts
//!
//! This module provides the store seam the upload engine is written against:
//! - `RecordStore`: batched get/write plus an atomic counter increment,
//!   shaped after provider APIs with per-call item ceilings
//! - `BatchGateway`: chunking, bounded concurrency and retry on top of a store
//! - `InMemoryStore`: a complete in-process implementation for tests and the CLI
//!
//! Stores report partial success the way managed key-value services do: a
//! batched call may succeed while leaving some keys or items unprocessed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{EntityKind, Record};

pub mod clicks;
pub mod config;
pub mod gateway;
pub mod memory;

pub use clicks::record_click;
pub use config::UploadConfig;
pub use gateway::{BatchGateway, ReadOutcome, WriteOutcome};
pub use memory::InMemoryStore;

/// Error type for store operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The call reached the store but failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The store is shedding load; the call may be retried
    #[error("Throttled: {0}")]
    Throttled(String),

    /// A single call carried more items than the store accepts
    #[error("{operation} limit exceeded: {requested} items requested, limit is {limit}")]
    LimitExceeded {
        operation: &'static str,
        limit: usize,
        requested: usize,
    },

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl StoreError {
    /// Whether retrying the same call can help
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RequestFailed(_) | StoreError::Throttled(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Response of one batched read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchGetOutput {
    /// Records found; keys with no record are simply absent
    pub records: Vec<Record>,
    /// Keys the store did not get to and that should be requested again
    pub unprocessed_keys: Vec<String>,
}

/// Response of one batched write
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchWriteOutput {
    /// Records the store did not persist and that should be sent again
    pub unprocessed: Vec<Record>,
}

/// Store trait for batched record access
///
/// Implementations must accept any call within their own per-call limits;
/// chunking to those limits is the caller's job (see [`BatchGateway`]).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the records stored under `keys`
    ///
    /// # Arguments
    /// * `kind` - Entity table to read from
    /// * `keys` - Primary key values
    ///
    /// # Returns
    /// Found records plus any keys left unprocessed
    async fn batch_get(&self, kind: EntityKind, keys: &[String]) -> StoreResult<BatchGetOutput>;

    /// Put full records, replacing whatever is stored under the same keys
    ///
    /// # Arguments
    /// * `kind` - Entity table to write to
    /// * `records` - Finalized records; each must carry its key field
    ///
    /// # Returns
    /// Records left unprocessed
    async fn batch_write(
        &self,
        kind: EntityKind,
        records: &[Record],
    ) -> StoreResult<BatchWriteOutput>;

    /// Atomically add `delta` to a numeric field, creating it at zero first
    ///
    /// # Returns
    /// The value after the increment
    async fn increment_counter(
        &self,
        kind: EntityKind,
        key: &str,
        field: &str,
        delta: f64,
    ) -> StoreResult<f64>;

    /// Get the store backend type name
    fn backend_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(StoreError::Throttled("slow down".into()).is_retryable());
        assert!(StoreError::RequestFailed("timeout".into()).is_retryable());
        assert!(!StoreError::InvalidInput("bad key".into()).is_retryable());
        assert!(
            !StoreError::LimitExceeded {
                operation: "batch_write",
                limit: 25,
                requested: 26
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_limit_error_message() {
        let err = StoreError::LimitExceeded {
            operation: "batch_get",
            limit: 100,
            requested: 150,
        };
        assert_eq!(
            err.to_string(),
            "batch_get limit exceeded: 150 items requested, limit is 100"
        );
    }
}
