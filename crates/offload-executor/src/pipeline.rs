//! The phase engine and driving loop.
//!
//! A `Pipeline` runs on one thread. It owns the request table, the phase
//! list and the completion dispatcher, and nothing in it is `Send`:
//! requests are only ever advanced, resumed and torn down on the thread
//! that created the pipeline.
//!
//! ```text
//! loop {
//!     1. Wait on the notifier (bounded by poll_timeout)
//!     2. Drain the completion queue
//!     3. For each completion:
//!          request live?    → restore context, resume at the suspended phase
//!          request closing? → drop result, release hold, reap when idle
//! }
//! ```

use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use offload_core::completion::CompletionSink;
use offload_core::error::{OffloadError, Result};
use offload_core::{kdebug, kerror, PhaseStatus, RequestId, Status};

use crate::config::DriverConfig;
use crate::dispatcher::{CompletionDispatcher, Delivery};
use crate::handler::PhaseHandler;
use crate::request::{Request, RequestTable};
use crate::stats::{Counters, DriverStats};
use crate::variables::{self, VariableGetter, VariableRegistry};

/// Result of driving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All phases ran, or a phase aborted the request.
    Finished(Status),
    /// A phase suspended; the request waits for `resume()`.
    Suspended,
}

struct Phase {
    name: String,
    handler: Box<dyn PhaseHandler>,
}

pub struct Pipeline {
    config: DriverConfig,
    phases: Vec<Phase>,
    requests: RequestTable,
    dispatcher: CompletionDispatcher,
    variables: VariableRegistry,
    counters: Rc<Counters>,
}

impl Pipeline {
    /// Pipeline with no phases and the elapsed-time variable registered
    /// under `config.variable`.
    pub fn new(config: DriverConfig, dispatcher: CompletionDispatcher) -> Result<Self> {
        config.validate()?;
        let mut vars = VariableRegistry::new();
        vars.register(config.variable.clone(), variables::elapsed_ms)?;

        let counters = Rc::new(Counters::default());
        Ok(Self {
            config,
            phases: Vec::new(),
            requests: RequestTable::new(Rc::clone(&counters)),
            dispatcher,
            variables: vars,
            counters,
        })
    }

    /// Register `handler` as the next phase. Phases run in registration order.
    pub fn add_phase(&mut self, name: impl Into<String>, handler: impl PhaseHandler + 'static) {
        let name = name.into();
        kdebug!("phase {} registered at {}", name, self.phases.len());
        self.phases.push(Phase {
            name,
            handler: Box::new(handler),
        });
    }

    /// Register a request-scoped variable.
    pub fn add_variable(&mut self, name: impl Into<String>, getter: VariableGetter) -> Result<()> {
        self.variables.register(name, getter)?;
        Ok(())
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Completion target for offload handlers.
    pub fn sink(&self) -> Arc<dyn CompletionSink> {
        self.dispatcher.sink()
    }

    pub fn requests(&self) -> &RequestTable {
        &self.requests
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(id)
    }

    pub fn stats(&self) -> DriverStats {
        self.counters.snapshot()
    }

    /// Create a request for `target`. It does not run until `run()`.
    pub fn begin(&mut self, target: impl Into<String>) -> RequestId {
        let id = self.requests.insert(target);
        kdebug!("{} created", id);
        id
    }

    /// Drive `id` through its phases until it finishes or suspends.
    pub fn run(&mut self, id: RequestId) -> Result<Outcome> {
        let req = self
            .requests
            .get_mut(id)
            .ok_or(OffloadError::UnknownRequest(id))?;
        if let Some(status) = req.finished() {
            return Ok(Outcome::Finished(status));
        }

        while let Some(phase) = self.phases.get(req.phase()) {
            match phase.handler.handle(req) {
                PhaseStatus::Continue => req.advance(),
                PhaseStatus::Suspend => {
                    kdebug!("{} suspended in phase {}", id, phase.name);
                    return Ok(Outcome::Suspended);
                }
                PhaseStatus::Error(status) => {
                    if status.is_server_error() {
                        kerror!("{} aborted in phase {}: {}", id, phase.name, status);
                    } else {
                        kdebug!("{} aborted in phase {}: {}", id, phase.name, status);
                    }
                    req.finish(status);
                    return Ok(Outcome::Finished(status));
                }
            }
        }
        req.finish(Status::OK);
        kdebug!("{} finished", id);
        Ok(Outcome::Finished(Status::OK))
    }

    /// Re-enter `id` at the phase that suspended it.
    ///
    /// A finished request is not re-run; its final outcome is returned again.
    pub fn resume(&mut self, id: RequestId) -> Result<Outcome> {
        let req = self
            .requests
            .get(id)
            .ok_or(OffloadError::UnknownRequest(id))?;
        if let Some(status) = req.finished() {
            return Ok(Outcome::Finished(status));
        }
        if let Some(state) = req.offload_state() {
            kdebug!("{} resumed, offload {}", id, state);
        }
        self.run(id)
    }

    /// Tear `id` down. A request with offloads in flight stays in the table
    /// as closing until its completions are observed and discarded.
    pub fn finalize(&mut self, id: RequestId) -> Result<()> {
        if self.requests.close(id)? {
            kdebug!("{} finalized", id);
        }
        Ok(())
    }

    /// Whether `id` still has a table entry (live or closing).
    pub fn contains(&self, id: RequestId) -> bool {
        self.requests.contains(id)
    }

    /// Wait up to `timeout` for completions, then dispatch every queued
    /// one. Returns the number of completions handled.
    pub fn poll(&mut self, timeout: Duration) -> Result<usize> {
        self.dispatcher.wait(Some(timeout))?;

        let mut handled = 0;
        while let Some(completion) = self.dispatcher.next() {
            handled += 1;
            match self.dispatcher.deliver(completion, &mut self.requests) {
                Delivery::Resume(id) => {
                    self.counters.resumed();
                    if let Err(e) = self.resume(id) {
                        kerror!("{} resume failed: {}", id, e);
                    }
                }
                Delivery::Discarded(_) => self.counters.discarded(),
            }
        }
        Ok(handled)
    }

    /// Poll until no request is waiting on a pool, or `deadline` passes.
    /// Returns whether the pipeline went idle.
    pub fn run_until_idle(&mut self, deadline: Instant) -> Result<bool> {
        while self.requests.blocked() > 0 {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            self.poll(self.config.poll_timeout.min(deadline - now))?;
        }
        Ok(true)
    }

    /// Read variable `name` of request `id`. `Ok(None)` is "not found".
    pub fn variable(&self, id: RequestId, name: &str) -> Result<Option<String>> {
        let req = self
            .requests
            .get(id)
            .ok_or(OffloadError::UnknownRequest(id))?;
        Ok(self.variables.get(name, req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::OffloadHandler;
    use offload_core::task::{TaskInput, TaskOutput};
    use offload_core::{OffloadState, WorkerPool};
    use offload_module::{FixedPool, PoolConfig};
    use std::cell::Cell;

    fn fast(input: &TaskInput) -> TaskOutput {
        TaskOutput::new(input.step * (input.seed as u32 + 1))
    }

    fn setup(threads: usize, max_queue: usize) -> (Pipeline, Arc<FixedPool>) {
        let pool = Arc::new(
            FixedPool::new(
                &PoolConfig::new()
                    .name("pipeline-test")
                    .threads(threads)
                    .max_queue(max_queue)
                    .park_timeout(Duration::from_millis(2)),
            )
            .unwrap(),
        );
        let config = DriverConfig::new()
            .sleep_step(Duration::from_millis(1))
            .poll_timeout(Duration::from_millis(5))
            .location("/sleep");
        let dispatcher = CompletionDispatcher::new().unwrap();
        let handler = OffloadHandler::new(pool.clone(), dispatcher.sink(), &config).work(fast);
        let mut p = Pipeline::new(config, dispatcher).unwrap();
        p.add_phase("offload", handler);
        (p, pool)
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn test_trivial_request_finishes_inline() {
        let (mut p, pool) = setup(1, 4);
        let id = p.begin("/health");
        assert_eq!(p.run(id).unwrap(), Outcome::Finished(Status::OK));
        assert_eq!(p.request(id).unwrap().offload_state(), None);
        assert_eq!(p.variable(id, "offload_elapsed_ms").unwrap(), None);
        pool.shutdown();
    }

    #[test]
    fn test_offload_resume_variable() {
        let (mut p, pool) = setup(2, 4);
        let id = p.begin("/sleep?seed=4");
        assert_eq!(p.run(id).unwrap(), Outcome::Suspended);
        assert_eq!(p.variable(id, "offload_elapsed_ms").unwrap(), None);

        assert!(p.run_until_idle(deadline()).unwrap());
        let req = p.request(id).unwrap();
        assert_eq!(req.finished(), Some(Status::OK));
        assert_eq!(req.offload_state(), Some(OffloadState::Done));
        assert_eq!(p.variable(id, "offload_elapsed_ms").unwrap().as_deref(), Some("5"));

        let stats = p.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.resumed, 1);
        pool.shutdown();
    }

    #[test]
    fn test_later_phases_run_after_resume() {
        let (mut p, pool) = setup(1, 4);
        let seen = Rc::new(Cell::new(0u32));
        let seen2 = Rc::clone(&seen);
        p.add_phase("log", move |r: &mut Request| {
            if r.context().and_then(|c| c.result()).is_some() {
                seen2.set(seen2.get() + 1);
            }
            PhaseStatus::Continue
        });

        let id = p.begin("/sleep?seed=0");
        assert_eq!(p.run(id).unwrap(), Outcome::Suspended);
        assert_eq!(seen.get(), 0);
        assert!(p.run_until_idle(deadline()).unwrap());
        assert_eq!(seen.get(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_error_phase_aborts() {
        let (mut p, pool) = setup(1, 4);
        p.add_phase("deny", |_: &mut Request| {
            PhaseStatus::Error(Status::SERVICE_UNAVAILABLE)
        });
        let id = p.begin("/other");
        assert_eq!(p.run(id).unwrap(), Outcome::Finished(Status::SERVICE_UNAVAILABLE));
        // Finished requests keep their outcome.
        assert_eq!(p.resume(id).unwrap(), Outcome::Finished(Status::SERVICE_UNAVAILABLE));
        assert_eq!(p.stats().resumed, 0);
        pool.shutdown();
    }

    #[test]
    fn test_unknown_request() {
        let (mut p, pool) = setup(1, 4);
        let ghost = RequestId::new(999);
        assert_eq!(p.run(ghost), Err(OffloadError::UnknownRequest(ghost)));
        assert_eq!(p.resume(ghost), Err(OffloadError::UnknownRequest(ghost)));
        assert_eq!(p.finalize(ghost), Err(OffloadError::UnknownRequest(ghost)));
        assert_eq!(
            p.variable(ghost, "offload_elapsed_ms"),
            Err(OffloadError::UnknownRequest(ghost))
        );
        pool.shutdown();
    }

    #[test]
    fn test_resume_while_processing_does_not_resubmit() {
        let (mut p, pool) = setup(1, 4);
        let id = p.begin("/sleep?seed=20");
        assert_eq!(p.run(id).unwrap(), Outcome::Suspended);
        // Early resume: the handler sees PROCESSING and keeps waiting.
        assert_eq!(p.resume(id).unwrap(), Outcome::Suspended);
        assert_eq!(p.stats().submitted, 1);
        assert_eq!(p.stats().resumed, 0);

        assert!(p.run_until_idle(deadline()).unwrap());
        assert_eq!(p.request(id).unwrap().finished(), Some(Status::OK));
        let stats = p.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.resumed, 1);
        pool.shutdown();
    }

    #[test]
    fn test_finalize_idle_request() {
        let (mut p, pool) = setup(1, 4);
        let id = p.begin("/health");
        p.run(id).unwrap();
        p.finalize(id).unwrap();
        assert!(!p.contains(id));
        assert!(p.request(id).is_none());
        pool.shutdown();
    }

    #[test]
    fn test_invalid_config() {
        let d = CompletionDispatcher::new().unwrap();
        let err = Pipeline::new(DriverConfig::new().variable(""), d).err();
        assert_eq!(err, Some(OffloadError::Config("variable name must not be empty")));
    }

    #[test]
    fn test_duplicate_variable() {
        let (mut p, pool) = setup(1, 4);
        assert!(p.add_variable("offload_state", variables::offload_state).is_ok());
        assert!(p.add_variable("offload_elapsed_ms", variables::offload_state).is_err());
        let id = p.begin("/sleep?seed=1");
        p.run(id).unwrap();
        assert_eq!(p.variable(id, "offload_state").unwrap().as_deref(), Some("PROCESSING"));
        pool.shutdown();
    }
}
