//! Requests and the request table.
//!
//! A [`Request`] owns its offload context. The context lives in one of
//! three places:
//!
//! ```text
//! Absent ──first offload──▶ Resident(Init) ──submit──▶ InFlight(hold)
//!                                                          │
//!                            Resident(Done) ◀──completion──┘
//! ```
//!
//! While `InFlight`, the boxed context is owned by the task on a worker
//! thread and the request only keeps the [`OffloadHold`] for it.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use offload_core::completion::CompletionSink;
use offload_core::error::{OffloadError, Result};
use offload_core::task::{TaskDescriptor, TaskInput, WorkFn};
use offload_core::worker::WorkerPool;
use offload_core::{kdebug, kerror, OffloadState, RequestContext, RequestId, Status};

use crate::hold::{OffloadHold, Outstanding};
use crate::stats::Counters;

enum ContextSlot {
    Absent,
    Resident(Box<RequestContext>),
    /// Context owned by a task. The hold is kept only for its `Drop`.
    InFlight { _hold: OffloadHold },
}

/// One request as seen by the driving thread.
pub struct Request {
    id: RequestId,
    target: String,
    /// Index of the phase to run next (or the phase that suspended).
    phase: usize,
    slot: ContextSlot,
    outstanding: Outstanding,
    /// Torn down by the pipeline but kept until outstanding work drains.
    closing: bool,
    finished: Option<Status>,
    counters: Rc<Counters>,
}

impl Request {
    fn new(id: RequestId, target: String, counters: Rc<Counters>) -> Self {
        Self {
            id,
            target,
            phase: 0,
            slot: ContextSlot::Absent,
            outstanding: Outstanding::new(),
            closing: false,
            finished: None,
            counters,
        }
    }

    #[inline]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Full request target, e.g. `/sleep?seed=4`.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Target without the query string.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Value of query argument `name`, if present.
    pub fn query_arg(&self, name: &str) -> Option<&str> {
        let (_, query) = self.target.split_once('?')?;
        query
            .split('&')
            .filter_map(|kv| kv.split_once('=').or(Some((kv, ""))))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    /// The offload context, when the driving thread owns it.
    pub fn context(&self) -> Option<&RequestContext> {
        match &self.slot {
            ContextSlot::Resident(ctx) => Some(ctx),
            _ => None,
        }
    }

    /// Offload state; `None` before the first offload.
    pub fn offload_state(&self) -> Option<OffloadState> {
        match &self.slot {
            ContextSlot::Absent => None,
            ContextSlot::Resident(ctx) => Some(ctx.state()),
            ContextSlot::InFlight { .. } => Some(OffloadState::Processing),
        }
    }

    /// Create the context in `Init` if the request has none.
    /// Returns whether one was created.
    pub fn ensure_context(&mut self) -> bool {
        if matches!(self.slot, ContextSlot::Absent) {
            self.slot = ContextSlot::Resident(Box::new(RequestContext::new(self.id)));
            kdebug!("{} offload context created", self.id);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self.slot, ContextSlot::InFlight { .. })
    }

    /// In-flight offloads holding this request open.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    #[inline]
    pub fn finished(&self) -> Option<Status> {
        self.finished
    }

    /// Hand the context to `pool` as a task running `work(input)`.
    ///
    /// The pool slot is claimed before the context leaves `Init`, so on any
    /// error the context is left resident and untouched. On success the
    /// context is owned by the task and the request holds one unit of
    /// outstanding work until the completion is delivered.
    pub fn offload(
        &mut self,
        pool: &dyn WorkerPool,
        input: TaskInput,
        work: WorkFn,
        sink: &Arc<dyn CompletionSink>,
    ) -> Result<()> {
        self.ensure_context();
        let state = match &self.slot {
            ContextSlot::Resident(ctx) => ctx.state(),
            ContextSlot::InFlight { .. } => {
                return Err(OffloadError::ProtocolViolation("offload already in flight"))
            }
            ContextSlot::Absent => return Err(OffloadError::AllocationFailure),
        };
        if state != OffloadState::Init {
            return Err(OffloadError::InvalidTransition {
                from: state,
                to: OffloadState::Processing,
            });
        }

        let reservation = match pool.reserve() {
            Ok(r) => r,
            Err(e) => {
                self.counters.rejected();
                kerror!("{} offload to thread_pool {} failed: {}", self.id, pool.name(), e);
                return Err(e);
            }
        };

        let hold = self.outstanding.hold();
        let mut ctx = match std::mem::replace(&mut self.slot, ContextSlot::InFlight { _hold: hold }) {
            ContextSlot::Resident(ctx) => ctx,
            // Checked above.
            _ => return Err(OffloadError::AllocationFailure),
        };
        if let Err(e) = ctx.begin() {
            // Restoring the slot drops the hold and the reservation.
            self.slot = ContextSlot::Resident(ctx);
            return Err(e);
        }

        pool.submit(reservation, TaskDescriptor::new(ctx, input, work, Arc::clone(sink)));
        self.counters.submitted();
        kdebug!("{} offloaded to thread_pool {} (seed={})", self.id, pool.name(), input.seed);
        Ok(())
    }

    /// Take back the context from a finished task. Releases the hold.
    pub(crate) fn complete(&mut self, ctx: Box<RequestContext>) -> Result<()> {
        if !self.is_in_flight() {
            return Err(OffloadError::ProtocolViolation("completion without offload"));
        }
        self.slot = ContextSlot::Resident(ctx);
        Ok(())
    }

    /// Drop a late completion for a torn-down request. Releases the hold.
    pub(crate) fn discard(&mut self, ctx: Box<RequestContext>) {
        self.slot = ContextSlot::Absent;
        drop(ctx);
    }

    #[inline]
    pub(crate) fn is_closing(&self) -> bool {
        self.closing
    }

    #[inline]
    pub(crate) fn phase(&self) -> usize {
        self.phase
    }

    #[inline]
    pub(crate) fn advance(&mut self) {
        self.phase += 1;
    }

    pub(crate) fn finish(&mut self, status: Status) {
        self.finished = Some(status);
    }
}

/// All requests known to one pipeline, keyed by id. Ids are never reused.
pub struct RequestTable {
    requests: HashMap<RequestId, Request>,
    next_id: u64,
    counters: Rc<Counters>,
}

impl RequestTable {
    pub(crate) fn new(counters: Rc<Counters>) -> Self {
        Self {
            requests: HashMap::new(),
            next_id: 1,
            counters,
        }
    }

    pub(crate) fn insert(&mut self, target: impl Into<String>) -> RequestId {
        let id = RequestId::new(self.next_id);
        self.next_id += 1;
        self.requests
            .insert(id, Request::new(id, target.into(), Rc::clone(&self.counters)));
        id
    }

    /// Live (not closing) request.
    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(&id).filter(|r| !r.closing)
    }

    /// Live (not closing) request.
    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.requests.get_mut(&id).filter(|r| !r.closing)
    }

    /// Any entry, including closing ones.
    pub(crate) fn entry_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.requests.get_mut(&id)
    }

    /// Tear `id` down. Entries with outstanding work stay as closing until
    /// it drains. Returns whether the entry was removed now.
    pub(crate) fn close(&mut self, id: RequestId) -> Result<bool> {
        let req = self.get_mut(id).ok_or(OffloadError::UnknownRequest(id))?;
        if req.outstanding() > 0 {
            req.closing = true;
            kdebug!("{} closing with {} outstanding", id, req.outstanding());
            return Ok(false);
        }
        self.requests.remove(&id);
        Ok(true)
    }

    /// Remove a closing entry once nothing holds it open.
    pub(crate) fn reap(&mut self, id: RequestId) -> bool {
        match self.requests.get(&id) {
            Some(r) if r.closing && r.outstanding() == 0 => {
                self.requests.remove(&id);
                kdebug!("{} released", id);
                true
            }
            _ => false,
        }
    }

    /// Whether any entry, live or closing, exists for `id`.
    pub fn contains(&self, id: RequestId) -> bool {
        self.requests.contains_key(&id)
    }

    /// Entries with outstanding work, including closing ones.
    pub fn blocked(&self) -> usize {
        self.requests.values().filter(|r| r.outstanding() > 0).count()
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.requests.values().filter(|r| !r.closing).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_core::task::{Completion, TaskOutput};
    use offload_core::worker::Reservation;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Pool that runs the task inline on submit.
    struct InlinePool {
        slots: Arc<AtomicUsize>,
        accept: bool,
    }

    impl InlinePool {
        fn new(accept: bool) -> Self {
            Self {
                slots: Arc::new(AtomicUsize::new(0)),
                accept,
            }
        }
    }

    impl WorkerPool for InlinePool {
        fn name(&self) -> &str {
            "inline"
        }
        fn reserve(&self) -> Result<Reservation> {
            if !self.accept {
                return Err(OffloadError::SubmissionRejected);
            }
            self.slots.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
            Ok(Reservation::new(Arc::clone(&self.slots)))
        }
        fn submit(&self, reservation: Reservation, task: TaskDescriptor) {
            drop(reservation);
            task.run();
        }
        fn active_workers(&self) -> usize {
            0
        }
        fn queued(&self) -> usize {
            0
        }
        fn total_workers(&self) -> usize {
            1
        }
        fn capacity(&self) -> usize {
            1
        }
        fn is_shutdown(&self) -> bool {
            false
        }
        fn shutdown(&self) {}
    }

    #[derive(Default)]
    struct VecSink(Mutex<Vec<Completion>>);

    impl CompletionSink for VecSink {
        fn push(&self, completion: Completion) -> Result<()> {
            self.0.lock().unwrap().push(completion);
            Ok(())
        }
    }

    fn fixed(input: &TaskInput) -> TaskOutput {
        TaskOutput::new(input.step * 3)
    }

    fn table() -> (RequestTable, Rc<Counters>) {
        let counters = Rc::new(Counters::default());
        (RequestTable::new(Rc::clone(&counters)), counters)
    }

    fn input() -> TaskInput {
        TaskInput::new(1, Duration::from_millis(2))
    }

    #[test]
    fn test_target_parsing() {
        let (mut t, _) = table();
        let id = t.insert("/sleep?seed=4&x&y=2");
        let r = t.get(id).unwrap();
        assert_eq!(r.path(), "/sleep");
        assert_eq!(r.query_arg("seed"), Some("4"));
        assert_eq!(r.query_arg("x"), Some(""));
        assert_eq!(r.query_arg("y"), Some("2"));
        assert_eq!(r.query_arg("z"), None);

        let id = t.insert("/plain");
        assert_eq!(t.get(id).unwrap().path(), "/plain");
        assert_eq!(t.get(id).unwrap().query_arg("seed"), None);
    }

    #[test]
    fn test_ids_not_reused() {
        let (mut t, _) = table();
        let a = t.insert("/a");
        assert!(t.close(a).unwrap());
        let b = t.insert("/b");
        assert_ne!(a, b);
        assert!(!t.contains(a));
    }

    #[test]
    fn test_offload_and_complete() {
        let (mut t, counters) = table();
        let sink_impl = Arc::new(VecSink::default());
        let sink: Arc<dyn CompletionSink> = sink_impl.clone();
        let pool = InlinePool::new(true);

        let id = t.insert("/");
        let r = t.get_mut(id).unwrap();
        assert_eq!(r.offload_state(), None);
        r.offload(&pool, input(), fixed, &sink).unwrap();
        assert!(r.is_in_flight());
        assert_eq!(r.offload_state(), Some(OffloadState::Processing));
        assert_eq!(r.outstanding(), 1);
        assert!(r.context().is_none());

        // A second offload while in flight is refused.
        assert_eq!(
            r.offload(&pool, input(), fixed, &sink),
            Err(OffloadError::ProtocolViolation("offload already in flight"))
        );

        let done = sink_impl.0.lock().unwrap().pop().unwrap();
        r.complete(done.into_context()).unwrap();
        assert_eq!(r.outstanding(), 0);
        assert_eq!(r.offload_state(), Some(OffloadState::Done));
        assert_eq!(r.context().unwrap().result().unwrap().elapsed_ms(), 6);
        assert_eq!(counters.snapshot().submitted, 1);

        // Done is terminal for this step.
        assert!(matches!(
            r.offload(&pool, input(), fixed, &sink),
            Err(OffloadError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_rejected_leaves_init() {
        let (mut t, counters) = table();
        let sink: Arc<dyn CompletionSink> = Arc::new(VecSink::default());
        let pool = InlinePool::new(false);

        let id = t.insert("/");
        let r = t.get_mut(id).unwrap();
        assert_eq!(
            r.offload(&pool, input(), fixed, &sink),
            Err(OffloadError::SubmissionRejected)
        );
        assert_eq!(r.offload_state(), Some(OffloadState::Init));
        assert_eq!(r.outstanding(), 0);
        assert_eq!(counters.snapshot().rejected, 1);
        assert_eq!(counters.snapshot().submitted, 0);
    }

    #[test]
    fn test_close_with_outstanding_keeps_entry() {
        let (mut t, _) = table();
        let sink_impl = Arc::new(VecSink::default());
        let sink: Arc<dyn CompletionSink> = sink_impl.clone();
        let pool = InlinePool::new(true);

        let id = t.insert("/");
        t.get_mut(id).unwrap().offload(&pool, input(), fixed, &sink).unwrap();
        assert_eq!(t.blocked(), 1);

        assert!(!t.close(id).unwrap());
        assert!(t.get(id).is_none());
        assert!(t.contains(id));
        assert_eq!(t.len(), 0);
        assert_eq!(t.close(id), Err(OffloadError::UnknownRequest(id)));
        assert!(!t.reap(id));

        let late = sink_impl.0.lock().unwrap().pop().unwrap();
        t.entry_mut(id).unwrap().discard(late.into_context());
        assert_eq!(t.blocked(), 0);
        assert!(t.reap(id));
        assert!(!t.contains(id));
    }

    #[test]
    fn test_complete_without_offload() {
        let (mut t, _) = table();
        let id = t.insert("/");
        let stray = Box::new(RequestContext::new(id));
        let r = t.get_mut(id).unwrap();
        assert!(r.complete(stray).is_err());
        assert_eq!(r.offload_state(), None);
    }
}
