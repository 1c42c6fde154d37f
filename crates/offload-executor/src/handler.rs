//! Phase handlers.
//!
//! A [`PhaseHandler`] is registered into a named phase of the [`Pipeline`]
//! and invoked for every request that reaches that phase, once on first
//! entry and again on each resume.
//!
//! [`OffloadHandler`] is the blocking-work entry point:
//!
//! ```text
//! no context / INIT  → offload to pool → Suspend
//!                      (rejected       → Error(500), context stays INIT)
//! PROCESSING         → protocol violation, logged → Suspend
//! DONE               → result readable as a variable → Continue
//! ```
//!
//! [`Pipeline`]: crate::pipeline::Pipeline

use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use offload_core::completion::CompletionSink;
use offload_core::error::Result;
use offload_core::task::{TaskInput, WorkFn};
use offload_core::worker::WorkerPool;
use offload_core::{kdebug, kerror, kwarn, OffloadState, PhaseStatus};
use offload_module::{sleep_task, PoolRegistry};

use crate::config::DriverConfig;
use crate::request::Request;

pub trait PhaseHandler {
    fn handle(&self, request: &mut Request) -> PhaseStatus;
}

impl<F> PhaseHandler for F
where
    F: Fn(&mut Request) -> PhaseStatus,
{
    fn handle(&self, request: &mut Request) -> PhaseStatus {
        self(request)
    }
}

pub struct OffloadHandler {
    pool: Arc<dyn WorkerPool>,
    sink: Arc<dyn CompletionSink>,
    work: WorkFn,
    step: Duration,
    location: String,
    rng: Cell<u64>,
}

impl OffloadHandler {
    /// Handler offloading `sleep_task` into `pool`, posting completions to
    /// `sink`.
    pub fn new(pool: Arc<dyn WorkerPool>, sink: Arc<dyn CompletionSink>, config: &DriverConfig) -> Self {
        Self {
            pool,
            sink,
            work: sleep_task,
            step: config.sleep_step,
            location: config.location.clone(),
            rng: Cell::new(clock_seed()),
        }
    }

    /// Handler bound to the registry pool `name`.
    pub fn from_registry(
        registry: &PoolRegistry,
        name: &str,
        sink: Arc<dyn CompletionSink>,
        config: &DriverConfig,
    ) -> Result<Self> {
        let pool = registry.get(name).map_err(|e| {
            kerror!("thread_pool \"{}\" not found", name);
            e
        })?;
        Ok(Self::new(pool, sink, config))
    }

    /// Replace the blocking function.
    pub fn work(mut self, work: WorkFn) -> Self {
        self.work = work;
        self
    }

    /// Seed the fallback generator, for reproducible runs.
    pub fn rng_seed(self, seed: u64) -> Self {
        self.rng.set(seed.max(1));
        self
    }

    fn applies_to(&self, request: &Request) -> bool {
        request.path().starts_with(&self.location)
    }

    /// `seed` query argument, or the next value of the generator.
    fn seed_for(&self, request: &Request) -> u64 {
        match request.query_arg("seed").and_then(|s| s.parse().ok()) {
            Some(seed) => seed,
            None => self.next_random(),
        }
    }

    fn next_random(&self) -> u64 {
        // xorshift64
        let mut x = self.rng.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng.set(x);
        x
    }
}

impl PhaseHandler for OffloadHandler {
    fn handle(&self, request: &mut Request) -> PhaseStatus {
        if !self.applies_to(request) {
            return PhaseStatus::Continue;
        }
        let state = request.offload_state();
        match state {
            None => kdebug!("{} offload handler", request.id()),
            Some(state) => kdebug!("{} offload handler re-entered: {}", request.id(), state),
        }

        match state {
            Some(OffloadState::Processing) => {
                kwarn!(
                    "{} offload handler invoked while {}; not resubmitting",
                    request.id(),
                    OffloadState::Processing
                );
                PhaseStatus::Suspend
            }
            Some(OffloadState::Done) => {
                if let Some(out) = request.context().and_then(|c| c.result()) {
                    kdebug!("{} offload done: {}ms", request.id(), out.elapsed_ms());
                }
                PhaseStatus::Continue
            }
            None | Some(OffloadState::Init) => {
                let input = TaskInput::new(self.seed_for(request), self.step);
                match request.offload(self.pool.as_ref(), input, self.work, &self.sink) {
                    Ok(()) => PhaseStatus::Suspend,
                    Err(e) => PhaseStatus::Error(e.status()),
                }
            }
        }
    }
}

fn clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    nanos | 1
}
