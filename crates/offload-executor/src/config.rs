//! Driving loop configuration
//!
//! Same layering as `PoolConfig`: library defaults, then environment
//! overrides via `from_env()`, then builder calls.

use std::time::Duration;

use offload_core::env::{env_get, env_get_str};
use offload_core::kinfo;
use offload_module::ConfigError;

/// Library defaults.
pub mod defaults {
    /// Max wait for a completion per loop turn
    pub const POLL_TIMEOUT_MS: u64 = 50;

    /// Sleep workload unit
    pub const SLEEP_STEP_MS: u64 = 100;

    /// Target prefix the offload handler applies to
    pub const LOCATION: &str = "/";

    /// Name of the elapsed-time request variable
    pub const VARIABLE: &str = "offload_elapsed_ms";
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub poll_timeout: Duration,
    pub sleep_step: Duration,
    pub location: String,
    pub variable: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DriverConfig {
    /// Environment variables (all optional):
    /// - `OFFLOAD_POLL_TIMEOUT_MS`
    /// - `OFFLOAD_SLEEP_STEP_MS`
    /// - `OFFLOAD_LOCATION`
    /// - `OFFLOAD_VARIABLE`
    pub fn from_env() -> Self {
        Self {
            poll_timeout: Duration::from_millis(env_get(
                "OFFLOAD_POLL_TIMEOUT_MS",
                defaults::POLL_TIMEOUT_MS,
            )),
            sleep_step: Duration::from_millis(env_get(
                "OFFLOAD_SLEEP_STEP_MS",
                defaults::SLEEP_STEP_MS,
            )),
            location: env_get_str("OFFLOAD_LOCATION", defaults::LOCATION),
            variable: env_get_str("OFFLOAD_VARIABLE", defaults::VARIABLE),
        }
    }

    /// Library defaults only (no env override).
    pub fn new() -> Self {
        Self {
            poll_timeout: Duration::from_millis(defaults::POLL_TIMEOUT_MS),
            sleep_step: Duration::from_millis(defaults::SLEEP_STEP_MS),
            location: defaults::LOCATION.to_string(),
            variable: defaults::VARIABLE.to_string(),
        }
    }

    pub fn poll_timeout(mut self, d: Duration) -> Self {
        self.poll_timeout = d;
        self
    }

    pub fn sleep_step(mut self, d: Duration) -> Self {
        self.sleep_step = d;
        self
    }

    pub fn location(mut self, prefix: impl Into<String>) -> Self {
        self.location = prefix.into();
        self
    }

    pub fn variable(mut self, name: impl Into<String>) -> Self {
        self.variable = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("poll_timeout must be > 0"));
        }
        if self.sleep_step.is_zero() {
            return Err(ConfigError::InvalidValue("sleep_step must be > 0"));
        }
        if !self.location.starts_with('/') {
            return Err(ConfigError::InvalidValue("location must start with '/'"));
        }
        if self.variable.is_empty() {
            return Err(ConfigError::InvalidValue("variable name must not be empty"));
        }
        Ok(())
    }

    pub fn print(&self) {
        kinfo!(
            "offload location={} variable=${} step={:?} poll_timeout={:?}",
            self.location,
            self.variable,
            self.sleep_step,
            self.poll_timeout
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = DriverConfig::new();
        assert_eq!(c.poll_timeout, Duration::from_millis(50));
        assert_eq!(c.sleep_step, Duration::from_millis(100));
        assert_eq!(c.location, "/");
        assert_eq!(c.variable, "offload_elapsed_ms");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(DriverConfig::new().poll_timeout(Duration::ZERO).validate().is_err());
        assert!(DriverConfig::new().sleep_step(Duration::ZERO).validate().is_err());
        assert!(DriverConfig::new().location("sleep").validate().is_err());
        assert!(DriverConfig::new().variable("").validate().is_err());
        assert!(DriverConfig::new().location("/sleep").validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("OFFLOAD_SLEEP_STEP_MS", "7");
        let c = DriverConfig::from_env();
        std::env::remove_var("OFFLOAD_SLEEP_STEP_MS");
        assert_eq!(c.sleep_step, Duration::from_millis(7));
    }
}
