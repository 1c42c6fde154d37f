//! # offload-module: Default (safe) implementations
//!
//! This crate provides the default implementation for every offload trait.
//! Each impl prioritizes correctness and simplicity over performance.
//!
//! ## Default stack
//!
//! | Trait          | Default Impl      | Platform alternative       |
//! |----------------|-------------------|----------------------------|
//! | WorkerPool     | FixedPool         | none                       |
//! | CompletionSink | CompletionQueue   | none                       |
//! | Notifier       | EventFdNotifier   | CondvarNotifier (non-Linux)|
//! | WorkerParking  | FutexParking      | FallbackParking (non-Linux)|
//!
//! Pools are created by name through a [`PoolRegistry`] owned by the
//! program's composition root, configured by [`PoolConfig`].

pub mod config;
pub mod parking;
pub mod notifier;
pub mod completion_queue;
pub mod fixed_pool;
pub mod registry;
pub mod work;

pub use completion_queue::CompletionQueue;
pub use config::{ConfigError, PoolConfig};
pub use fixed_pool::{FixedPool, PoolStats};
pub use notifier::{new_notifier, CondvarNotifier, PlatformNotifier};
pub use registry::PoolRegistry;
pub use work::{delay_for_seed, sleep_task};
