//! # offload-executor: The Driving Loop
//!
//! Everything that runs on the driving thread: the phase engine, the
//! request table, completion dispatch and the offload phase handler.
//!
//! ```text
//!  Pipeline::run(req)
//!      │
//!      ├─▶ OffloadHandler ──reserve/submit──▶ FixedPool ──▶ worker: sleep_task
//!      │        │                                              │
//!      │     Suspend                                    CompletionQueue + notify
//!      │                                                       │
//!  Pipeline::poll() ◀──────────── CompletionDispatcher ◀───────┘
//!      │
//!      └─▶ resume(req) ─▶ OffloadHandler (DONE) ─▶ Continue ─▶ next phase
//! ```
//!
//! ## Composition
//!
//! ```rust,ignore
//! let mut registry = PoolRegistry::new();
//! registry.add(&PoolConfig::from_env())?;
//!
//! let config = DriverConfig::from_env();
//! let dispatcher = CompletionDispatcher::new()?;
//! let handler = OffloadHandler::from_registry(&registry, "offload", dispatcher.sink(), &config)?;
//! let mut pipeline = Pipeline::new(config, dispatcher)?;
//! pipeline.add_phase("offload", handler);
//! ```

pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod hold;
pub mod pipeline;
pub mod request;
pub mod stats;
pub mod variables;

pub use config::DriverConfig;
pub use dispatcher::{CompletionDispatcher, Delivery};
pub use handler::{OffloadHandler, PhaseHandler};
pub use hold::{OffloadHold, Outstanding};
pub use pipeline::{Outcome, Pipeline};
pub use request::{Request, RequestTable};
pub use stats::DriverStats;
pub use variables::{VariableGetter, VariableRegistry};
