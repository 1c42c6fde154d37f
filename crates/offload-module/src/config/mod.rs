//! Worker pool configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (via `from_env()`)
//! 3. Library defaults (`defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use offload_module::PoolConfig;
//!
//! let config = PoolConfig::from_env()
//!     .name("disk")
//!     .threads(8)
//!     .max_queue(1024);
//! config.validate()?;
//! ```

pub mod defaults;

use std::time::Duration;

use offload_core::env::{env_get, env_get_str};
use offload_core::{kinfo, OffloadError};

/// Configuration for one named pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Registry name
    pub name: String,
    /// Number of worker threads
    pub threads: usize,
    /// Queue capacity (tasks waiting for a worker)
    pub max_queue: usize,
    /// How long an idle worker sleeps before re-checking the queue
    pub park_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `OFFLOAD_POOL_NAME` - Pool name
    /// - `OFFLOAD_POOL_THREADS` - Worker threads
    /// - `OFFLOAD_POOL_MAX_QUEUE` - Queue capacity
    /// - `OFFLOAD_PARK_TIMEOUT_MS` - Idle worker re-check interval
    pub fn from_env() -> Self {
        Self {
            name: env_get_str("OFFLOAD_POOL_NAME", defaults::POOL_NAME),
            threads: env_get("OFFLOAD_POOL_THREADS", defaults::THREADS),
            max_queue: env_get("OFFLOAD_POOL_MAX_QUEUE", defaults::MAX_QUEUE),
            park_timeout: Duration::from_millis(env_get(
                "OFFLOAD_PARK_TIMEOUT_MS",
                defaults::PARK_TIMEOUT_MS,
            )),
        }
    }

    /// Library defaults only (no env override).
    pub fn new() -> Self {
        Self {
            name: defaults::POOL_NAME.to_string(),
            threads: defaults::THREADS,
            max_queue: defaults::MAX_QUEUE,
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
        }
    }

    // Builder methods

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    pub fn max_queue(mut self, n: usize) -> Self {
        self.max_queue = n;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue("pool name must not be empty"));
        }
        if self.threads == 0 {
            return Err(ConfigError::InvalidValue("threads must be > 0"));
        }
        if self.threads > defaults::MAX_THREADS {
            return Err(ConfigError::InvalidValue("threads must be <= 512"));
        }
        if self.max_queue == 0 {
            return Err(ConfigError::InvalidValue("max_queue must be > 0"));
        }
        if self.park_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("park_timeout must be > 0"));
        }
        Ok(())
    }

    pub fn print(&self) {
        kinfo!(
            "thread_pool {} threads={} max_queue={} park_timeout={:?}",
            self.name,
            self.threads,
            self.max_queue,
            self.park_timeout
        );
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
    DuplicatePool(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
            ConfigError::DuplicatePool(name) => write!(f, "duplicate thread pool \"{}\"", name),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for OffloadError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => OffloadError::Config(msg),
            ConfigError::DuplicatePool(_) => OffloadError::Config("duplicate thread pool"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = PoolConfig::new();
        assert_eq!(config.name, "offload");
        assert_eq!(config.threads, 32);
        assert_eq!(config.max_queue, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new()
            .name("disk")
            .threads(4)
            .max_queue(16)
            .park_timeout(Duration::from_millis(2));
        assert_eq!(config.name, "disk");
        assert_eq!(config.threads, 4);
        assert_eq!(config.max_queue, 16);
        assert_eq!(config.park_timeout, Duration::from_millis(2));
    }

    #[test]
    fn test_validation() {
        assert!(PoolConfig::new().threads(0).validate().is_err());
        assert!(PoolConfig::new().threads(513).validate().is_err());
        assert!(PoolConfig::new().max_queue(0).validate().is_err());
        assert!(PoolConfig::new().name("").validate().is_err());
        assert!(PoolConfig::new().park_timeout(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("OFFLOAD_POOL_MAX_QUEUE", "77");
        let config = PoolConfig::from_env();
        std::env::remove_var("OFFLOAD_POOL_MAX_QUEUE");
        assert_eq!(config.max_queue, 77);
    }

    #[test]
    fn test_into_offload_error() {
        let e: OffloadError = ConfigError::InvalidValue("threads must be > 0").into();
        assert_eq!(e, OffloadError::Config("threads must be > 0"));
    }
}
