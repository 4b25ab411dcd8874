//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, HarborResult};

/// Default number of decoded assets held in the memory tier.
pub const DEFAULT_MEMORY_CAPACITY: usize = 50;

/// Default network fetch timeout in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Largest accepted memory tier capacity.
pub const MAX_MEMORY_CAPACITY: usize = 100_000;

/// Largest accepted LMDB map size in megabytes (1 TiB).
pub const MAX_DURABLE_SIZE_MB: usize = 1 << 20;

/// Memory tier and fetch pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of decoded assets kept in memory.
    pub memory_capacity: usize,
    /// Network fetch timeout in milliseconds.
    pub fetch_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory tier capacity.
    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    /// Set the network fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The network fetch timeout as a [`Duration`].
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.memory_capacity".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.memory_capacity > MAX_MEMORY_CAPACITY {
            return Err(ConfigError::InvalidValue {
                field: "cache.memory_capacity".to_string(),
                reason: format!("must be <= {}", MAX_MEMORY_CAPACITY),
            });
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.fetch_timeout_ms".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// On-disk (LMDB) durable tier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurableConfig {
    /// Directory holding the LMDB environment.
    pub path: PathBuf,
    /// Maximum map size in megabytes.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: usize,
}

fn default_max_size_mb() -> usize {
    256
}

impl DurableConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_mb: default_max_size_mb(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "durable.path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "durable.max_size_mb".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_size_mb > MAX_DURABLE_SIZE_MB {
            return Err(ConfigError::InvalidValue {
                field: "durable.max_size_mb".to_string(),
                reason: format!("must be <= {}", MAX_DURABLE_SIZE_MB),
            });
        }
        Ok(())
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub user_agent: String,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("harbor/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout_ms: 5_000,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "http.user_agent".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.connect_timeout_ms".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Master configuration struct.
///
/// Every section has defaults; the durable tier is only enabled when a
/// `[durable]` section is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarborConfig {
    pub cache: CacheConfig,
    pub durable: Option<DurableConfig>,
    pub http: HttpConfig,
}

impl HarborConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(contents: &str) -> HarborResult<Self> {
        let config: HarborConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file.
    pub fn from_path(path: &Path) -> HarborResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate every section.
    /// Returns Ok(()) if valid, Err(HarborError::Config) if invalid.
    pub fn validate(&self) -> HarborResult<()> {
        self.cache.validate()?;
        if let Some(durable) = &self.durable {
            durable.validate()?;
        }
        self.http.validate()?;
        Ok(())
    }
}
