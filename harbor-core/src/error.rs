//! Error types for HARBOR operations

use std::time::Duration;
use thiserror::Error;

/// Cache orchestration errors.
///
/// None of these escape `AssetCache::load`; they are logged and collapsed
/// into an absent result at that boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Asset not found: {key}")]
    NotFound { key: String },

    #[error("Decode failed for {key}: {reason}")]
    DecodeFailure { key: String, reason: String },

    #[error("Transport failed for {key}: {reason}")]
    TransportFailure { key: String, reason: String },

    #[error("Durable cache not configured")]
    Unavailable,
}

/// Network transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

/// Durable storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage I/O error: {reason}")]
    Io { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Payload decode error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Decode failed: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or HARBOR_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all HARBOR errors.
#[derive(Debug, Clone, Error)]
pub enum HarborError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for HARBOR operations.
pub type HarborResult<T> = Result<T, HarborError>;

// =============================================================================
// TESTS
// =============================================================================
