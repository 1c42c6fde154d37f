//! # offload-core: Trait definitions for blocking-work offload
//!
//! A single driving thread runs a non-blocking request pipeline. When a
//! request needs a blocking operation, the pipeline hands the request's
//! context to a bounded worker pool, suspends the request, and resumes it
//! once the worker posts a completion back to the driving thread.
//!
//! This crate defines the types that cross that thread boundary and the
//! trait boundaries for each component. Default implementations live in
//! `offload-module`; the driving loop lives in `offload-executor`.
//!
//! ## Modules
//!
//! - `id` - Request identifier
//! - `state` - Offload state machine (`INIT → PROCESSING → DONE`)
//! - `context` - Per-request offload context
//! - `task` - Task descriptor and completion event
//! - `phase` - Phase handler return codes and response status
//! - `worker` - Worker pool trait
//! - `completion` - Completion sink trait
//! - `notifier` - Driving-thread wake trait
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod context;
pub mod task;
pub mod phase;
pub mod worker;
pub mod completion;
pub mod notifier;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::RequestId;
pub use state::OffloadState;
pub use context::RequestContext;
pub use task::{Completion, TaskDescriptor, TaskInput, TaskOutput, WorkFn};
pub use phase::{PhaseStatus, Status};
pub use worker::{Reservation, WorkerPool};
pub use completion::CompletionSink;
pub use notifier::Notifier;
pub use error::{OffloadError, Result};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
pub use kprint::{set_flush_enabled, set_log_level, LogLevel};
