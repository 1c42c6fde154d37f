//! Named pool registry.
//!
//! Owned by the composition root. Pools are created once at startup and
//! looked up by name by every handler that offloads into them.

use std::collections::HashMap;
use std::sync::Arc;

use offload_core::error::{OffloadError, Result};
use offload_core::worker::WorkerPool;
use offload_core::{kinfo, kwarn};

use crate::config::{ConfigError, PoolConfig};
use crate::fixed_pool::FixedPool;

#[derive(Default)]
pub struct PoolRegistry {
    pools: HashMap<String, Arc<FixedPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and start a pool under `config.name`.
    pub fn add(&mut self, config: &PoolConfig) -> Result<Arc<FixedPool>> {
        if self.pools.contains_key(&config.name) {
            let e = ConfigError::DuplicatePool(config.name.clone());
            kwarn!("{}", e);
            return Err(e.into());
        }
        let pool = Arc::new(FixedPool::new(config)?);
        self.pools.insert(config.name.clone(), Arc::clone(&pool));
        Ok(pool)
    }

    /// Look up a running pool.
    pub fn get(&self, name: &str) -> Result<Arc<FixedPool>> {
        match self.pools.get(name) {
            Some(pool) if !pool.is_shutdown() => Ok(Arc::clone(pool)),
            _ => Err(OffloadError::PoolUnavailable),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Shut every pool down, draining queued work.
    pub fn shutdown_all(&self) {
        for (name, pool) in &self.pools {
            pool.shutdown();
            let stats = pool.stats();
            kinfo!(
                "thread_pool {} stopped: submitted={} completed={} rejected={}",
                name,
                stats.submitted,
                stats.completed,
                stats.rejected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small(name: &str) -> PoolConfig {
        PoolConfig::new()
            .name(name)
            .threads(1)
            .max_queue(4)
            .park_timeout(Duration::from_millis(5))
    }

    #[test]
    fn test_add_and_get() {
        let mut reg = PoolRegistry::new();
        reg.add(&small("disk")).unwrap();
        reg.add(&small("net")).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.names(), vec!["disk", "net"]);
        assert_eq!(reg.get("disk").unwrap().name(), "disk");
        reg.shutdown_all();
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = PoolRegistry::new();
        reg.add(&small("disk")).unwrap();
        let err = reg.add(&small("disk")).err();
        assert_eq!(err, Some(OffloadError::Config("duplicate thread pool")));
        assert_eq!(reg.len(), 1);
        reg.shutdown_all();
    }

    #[test]
    fn test_missing_or_stopped_is_unavailable() {
        let mut reg = PoolRegistry::new();
        assert_eq!(reg.get("nope").err(), Some(OffloadError::PoolUnavailable));

        reg.add(&small("disk")).unwrap();
        reg.shutdown_all();
        assert_eq!(reg.get("disk").err(), Some(OffloadError::PoolUnavailable));
    }

    #[test]
    fn test_invalid_config_not_registered() {
        let mut reg = PoolRegistry::new();
        let err = reg.add(&small("bad").threads(0)).err();
        assert_eq!(err, Some(OffloadError::Config("threads must be > 0")));
        assert!(reg.is_empty());
    }
}
