//! `FixedPool`: default `WorkerPool` implementation.
//!
//! Spawns N OS threads at creation. Workers dequeue from a bounded
//! lock-free FIFO queue, run the task body (which may block), and the task
//! posts its own completion to its sink. Idle workers park until `submit()`
//! wakes them.
//!
//! Queue accounting: `slots` counts reserved + queued tasks and never
//! exceeds the queue capacity, so a push into a reserved slot always fits.
//!
//! No dynamic scaling. Simple, predictable, safe.

use offload_core::error::{OffloadError, Result};
use offload_core::task::TaskDescriptor;
use offload_core::worker::{Reservation, WorkerPool};
use offload_core::{kdebug, kerror, kinfo, ktrace};

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::config::PoolConfig;
use crate::parking::{new_parking, WorkerParking};

/// Point-in-time counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub rejected: u64,
    pub active: usize,
    pub queued: usize,
    pub total: usize,
}

/// Shared state between the submitting thread and the workers.
struct PoolInner {
    name: String,
    /// Work queue: driving thread → workers.
    queue: ArrayQueue<TaskDescriptor>,
    /// Reserved + queued tasks.
    slots: Arc<AtomicUsize>,
    /// Workers currently running a task.
    active: AtomicUsize,
    shutdown: AtomicBool,
    parking: Box<dyn WorkerParking>,
    park_timeout: Duration,
    total: usize,
    submitted: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
}

impl PoolInner {
    fn reject(&self, e: OffloadError) -> Result<Reservation> {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        Err(e)
    }
}

pub struct FixedPool {
    inner: Arc<PoolInner>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl FixedPool {
    /// Create a pool from a validated config and start its workers.
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            name: config.name.clone(),
            queue: ArrayQueue::new(config.max_queue),
            slots: Arc::new(AtomicUsize::new(0)),
            active: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            parking: new_parking(),
            park_timeout: config.park_timeout,
            total: config.threads,
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        });

        let mut handles = Vec::with_capacity(config.threads);
        for worker_id in 0..config.threads {
            let worker_inner = Arc::clone(&inner);
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{}", config.name, worker_id))
                .spawn(move || worker_loop(worker_inner, worker_id));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    kerror!("thread_pool {}: cannot spawn worker {}: {}", config.name, worker_id, e);
                    inner.shutdown.store(true, Ordering::SeqCst);
                    inner.parking.wake_all();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(OffloadError::AllocationFailure);
                }
            }
        }

        kinfo!(
            "thread_pool {} started: threads={} max_queue={}",
            config.name,
            config.threads,
            config.max_queue
        );

        Ok(FixedPool {
            inner,
            handles: Mutex::new(handles),
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.inner.submitted.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            active: self.inner.active.load(Ordering::Relaxed),
            queued: self.inner.queue.len(),
            total: self.inner.total,
        }
    }
}

impl WorkerPool for FixedPool {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn reserve(&self) -> Result<Reservation> {
        let inner = &self.inner;
        if inner.shutdown.load(Ordering::Acquire) {
            return inner.reject(OffloadError::PoolUnavailable);
        }

        let capacity = inner.queue.capacity();
        let mut current = inner.slots.load(Ordering::Acquire);
        loop {
            if current >= capacity {
                return inner.reject(OffloadError::SubmissionRejected);
            }
            match inner.slots.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        // Pairs with the worker exit check: either the workers see this slot
        // and keep running, or we see the shutdown and give it back.
        if inner.shutdown.load(Ordering::SeqCst) {
            inner.slots.fetch_sub(1, Ordering::AcqRel);
            return inner.reject(OffloadError::PoolUnavailable);
        }
        Ok(Reservation::new(Arc::clone(&inner.slots)))
    }

    fn submit(&self, reservation: Reservation, task: TaskDescriptor) {
        debug_assert!(
            reservation.belongs_to(&self.inner.slots),
            "reservation submitted to a different pool"
        );

        ktrace!("thread_pool {}: queue {}", self.inner.name, task.request());
        let mut task = task;
        // The reservation guarantees room, so this push does not fail while
        // the slot accounting holds.
        while let Err(back) = self.inner.queue.push(task) {
            task = back;
            self.inner.parking.wake_one();
            thread::yield_now();
        }
        reservation.commit();
        self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        self.inner.parking.wake_one();
    }

    fn active_workers(&self) -> usize {
        self.inner.active.load(Ordering::Relaxed)
    }

    fn queued(&self) -> usize {
        self.inner.queue.len()
    }

    fn total_workers(&self) -> usize {
        self.inner.total
    }

    fn capacity(&self) -> usize {
        self.inner.queue.capacity()
    }

    fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        if !self.inner.shutdown.swap(true, Ordering::SeqCst) {
            kinfo!(
                "thread_pool {} shutting down ({} queued, {} active)",
                self.inner.name,
                self.inner.queue.len(),
                self.inner.active.load(Ordering::Relaxed)
            );
        }
        self.inner.parking.wake_all();

        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let me = thread::current().id();
        for handle in handles {
            // A task that shuts down its own pool cannot join itself.
            if handle.thread().id() == me {
                continue;
            }
            if handle.join().is_err() {
                kerror!("thread_pool {}: worker panicked", self.inner.name);
            }
        }
    }
}

impl Drop for FixedPool {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.parking.wake_all();
        // Workers drain the queue and exit on their own. We don't join here
        // to avoid blocking the driving thread; call shutdown() to wait.
    }
}

/// Marks a worker busy for the lifetime of one task, including a task
/// that unwinds.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        ActiveGuard(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Worker thread main loop.
///
/// Exits once shutdown is set and no task is queued or reserved, so every
/// accepted task runs to completion.
fn worker_loop(inner: Arc<PoolInner>, worker_id: usize) {
    kdebug!("thread_pool {}: worker {} started", inner.name, worker_id);
    loop {
        if let Some(task) = inner.queue.pop() {
            inner.slots.fetch_sub(1, Ordering::AcqRel);
            {
                let _busy = ActiveGuard::enter(&inner.active);
                task.run();
            }
            inner.completed.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if inner.shutdown.load(Ordering::SeqCst) && inner.slots.load(Ordering::SeqCst) == 0 {
            break;
        }

        let epoch = inner.parking.prepare_park();
        if inner.queue.is_empty() {
            inner.parking.park(epoch, Some(inner.park_timeout));
        }
    }
    kdebug!("thread_pool {}: worker {} stopped", inner.name, worker_id);
}
