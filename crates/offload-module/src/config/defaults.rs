//! Library defaults for pool configuration.
//!
//! Match the usual `thread_pool default threads=32 max_queue=65536` sizing.

/// Pool name used when none is configured
pub const POOL_NAME: &str = "offload";

/// Worker threads per pool
pub const THREADS: usize = 32;

/// Upper bound on worker threads per pool
pub const MAX_THREADS: usize = 512;

/// Tasks that may wait in the queue before submission is rejected
pub const MAX_QUEUE: usize = 65536;

/// Idle worker re-check interval in milliseconds
pub const PARK_TIMEOUT_MS: u64 = 10;
