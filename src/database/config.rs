//! Upload configuration file support
//!
//! Handles parsing of `.tabular-upsert.toml` configuration files and
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{StoreError, StoreResult};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".tabular-upsert.toml";

/// Items per batched write; the provider ceiling
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Keys per batched read
pub const DEFAULT_BATCH_GET_LIMIT: usize = 100;

/// Hard per-upload row ceiling
pub const DEFAULT_MAX_RECORDS: usize = 4000;

/// Environment variable for the write chunk size
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";

/// Environment variable for the read chunk size
pub const ENV_BATCH_GET_LIMIT: &str = "BATCH_GET_LIMIT";

/// Environment variable for the row ceiling
pub const ENV_MAX_RECORDS: &str = "MAX_RECORDS";

/// Environment variable for concurrent chunk calls
pub const ENV_MAX_CONCURRENCY: &str = "UPLOAD_MAX_CONCURRENCY";

/// Environment variable for retry attempts after the first call
pub const ENV_MAX_RETRIES: &str = "UPLOAD_MAX_RETRIES";

/// Environment variable for the first backoff delay
pub const ENV_INITIAL_BACKOFF_MS: &str = "UPLOAD_INITIAL_BACKOFF_MS";

/// Environment variable for the backoff ceiling
pub const ENV_MAX_BACKOFF_MS: &str = "UPLOAD_MAX_BACKOFF_MS";

/// Chunking configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSection {
    /// Items per batched write
    #[serde(default = "default_batch_size")]
    pub size: usize,

    /// Keys per batched read
    #[serde(default = "default_batch_get_limit")]
    pub get_limit: usize,

    /// Rows accepted in one upload
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Chunk calls in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_get_limit() -> usize {
    DEFAULT_BATCH_GET_LIMIT
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            get_limit: default_batch_get_limit(),
            max_records: default_max_records(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Retry configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySection {
    /// Attempts after the first call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    2000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetrySection {
    /// Exponential backoff with jitter, capped at `max_backoff_ms`
    ///
    /// `attempt` is zero-based: the delay before the first retry uses 0.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let capped = self
            .initial_backoff_ms
            .saturating_mul(exp)
            .min(self.max_backoff_ms);
        // ±25% jitter
        let jitter_range = capped / 4;
        let jitter = if jitter_range > 0 {
            let seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos() as u64;
            seed % (jitter_range * 2)
        } else {
            0
        };
        let with_jitter = capped
            .saturating_sub(jitter_range)
            .saturating_add(jitter)
            .min(self.max_backoff_ms);
        Duration::from_millis(with_jitter)
    }
}

/// Main configuration structure
///
/// Represents the `.tabular-upsert.toml` configuration file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UploadConfig {
    /// Chunking and ceilings
    #[serde(default)]
    pub batch: BatchSection,

    /// Retry policy for store calls
    #[serde(default)]
    pub retry: RetrySection,
}

impl UploadConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from the process environment
    pub fn from_env() -> StoreResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.tabular-upsert.toml` in the directory.
    /// Falls back to defaults if not found.
    pub fn load(dir: &Path) -> StoreResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| StoreError::IoError(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> StoreResult<Self> {
        toml::from_str(content)
            .map_err(|e| StoreError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> StoreResult<()> {
        let config_path = dir.join(CONFIG_FILENAME);
        let content = self.to_toml()?;

        std::fs::write(&config_path, content)
            .map_err(|e| StoreError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable source
    ///
    /// Values that do not parse are ignored and the current setting is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            name: &str,
        ) -> Option<T> {
            lookup(name).and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = parsed(&lookup, ENV_BATCH_SIZE) {
            self.batch.size = v;
        }
        if let Some(v) = parsed(&lookup, ENV_BATCH_GET_LIMIT) {
            self.batch.get_limit = v;
        }
        if let Some(v) = parsed(&lookup, ENV_MAX_RECORDS) {
            self.batch.max_records = v;
        }
        if let Some(v) = parsed(&lookup, ENV_MAX_CONCURRENCY) {
            self.batch.max_concurrency = v;
        }
        if let Some(v) = parsed(&lookup, ENV_MAX_RETRIES) {
            self.retry.max_retries = v;
        }
        if let Some(v) = parsed(&lookup, ENV_INITIAL_BACKOFF_MS) {
            self.retry.initial_backoff_ms = v;
        }
        if let Some(v) = parsed(&lookup, ENV_MAX_BACKOFF_MS) {
            self.retry.max_backoff_ms = v;
        }
    }

    /// Reject settings the gateway cannot work with
    pub fn validate(&self) -> StoreResult<()> {
        let sizes = [
            ("batch.size", self.batch.size),
            ("batch.get_limit", self.batch.get_limit),
            ("batch.max_records", self.batch.max_records),
            ("batch.max_concurrency", self.batch.max_concurrency),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(StoreError::ConfigError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(StoreError::ConfigError(format!(
                "retry.initial_backoff_ms ({}) must be <= retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        Ok(())
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Tabular upsert configuration
# Every value can also be set through the environment variable noted beside it.

[batch]
# Items per batched write (BATCH_SIZE); the store rejects more than 25
size = 25

# Keys per batched read (BATCH_GET_LIMIT)
get_limit = 100

# Rows accepted in one upload (MAX_RECORDS)
max_records = 4000

# Chunk calls in flight at once (UPLOAD_MAX_CONCURRENCY)
max_concurrency = 4

[retry]
# Attempts after the first call (UPLOAD_MAX_RETRIES)
max_retries = 3

# First backoff delay in milliseconds (UPLOAD_INITIAL_BACKOFF_MS)
initial_backoff_ms = 50

# Backoff ceiling in milliseconds (UPLOAD_MAX_BACKOFF_MS)
max_backoff_ms = 2000
"#
}
