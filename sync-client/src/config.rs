//! Configuration for the zonesync client.
//!
//! Configuration is loaded from a TOML file or string. Every section and
//! every field is optional; missing values take the defaults below.
//!
//! ```toml
//! [batching]
//! batch_size = 400
//! auto_shrink_on_overflow = true
//! auto_retry = true
//! max_attempts = 3
//!
//! [faults.zone_changes]
//! mode = "simulated_fail"
//! delay_ms = 500
//!
//! [timeouts]
//! request_timeout_ms = 60000
//! ```
//!
//! Components hold a `tokio::sync::watch::Receiver<SyncConfig>` and take a
//! snapshot at the start of every call, so a new configuration applies to
//! the next operation without rebuilding anything.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zonesync_core::{FaultPolicy, DEFAULT_BATCH_SIZE, DEFAULT_MAX_ATTEMPTS};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SyncConfig {
    /// Mutation batching.
    #[serde(default)]
    pub batching: BatchingConfig,
    /// Fault injection per operation kind.
    #[serde(default)]
    pub faults: FaultConfig,
    /// Remote call timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Mutation batching configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchingConfig {
    /// Items per save chunk and per delete chunk (default: 400).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Halve the batch size and restart when a batch is too large (default: true).
    #[serde(default = "default_true")]
    pub auto_shrink_on_overflow: bool,
    /// Retry retriable failures when the server suggests a delay (default: true).
    #[serde(default = "default_true")]
    pub auto_retry: bool,
    /// Attempts per batch, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Fault injection configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FaultConfig {
    /// Policy for database-level change fetches.
    #[serde(default)]
    pub database_changes: FaultPolicy,
    /// Policy for zone-level change fetches.
    #[serde(default)]
    pub zone_changes: FaultPolicy,
}

/// Timeout configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound for one remote call, in milliseconds. No bound when unset.
    pub request_timeout_ms: Option<u64>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_true() -> bool {
    true
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            auto_shrink_on_overflow: default_true(),
            auto_retry: default_true(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl TimeoutConfig {
    /// Timeout as a duration; `None` when unset or zero.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            origin: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or validated.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            origin: "<string>".to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batching.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batching.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.batching.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "batching.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set the default batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batching.batch_size = batch_size;
        self
    }

    /// Set the request timeout. A nonzero timeout below one millisecond
    /// rounds up to one millisecond.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        let ms = match u64::try_from(timeout.as_millis()) {
            Ok(0) if !timeout.is_zero() => 1,
            Ok(ms) => ms,
            Err(_) => u64::MAX,
        };
        self.timeouts.request_timeout_ms = Some(ms);
        self
    }

    /// Set the fault policy for zone-level change fetches.
    pub fn with_zone_fault(mut self, policy: FaultPolicy) -> Self {
        self.faults.zone_changes = policy;
        self
    }

    /// Set the fault policy for database-level change fetches.
    pub fn with_database_fault(mut self, policy: FaultPolicy) -> Self {
        self.faults.database_changes = policy;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration.
    #[error("failed to parse config {origin}: {source}")]
    ParseError {
        /// File path, or `<string>` for in-memory input.
        origin: String,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
