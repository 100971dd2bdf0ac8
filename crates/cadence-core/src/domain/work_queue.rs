//! # Bounded Work Queue
//!
//! Caps how many submitted tasks run at once. Tasks beyond the cap wait in a
//! FIFO and start in submission order as slots free up; completions may
//! arrive in any order. There is no priority and no cancellation.
//!
//! ## Invariant
//!
//! `running <= concurrency_limit` at every observation point. A slot is
//! claimed under the state lock before the task is spawned and released
//! under the same lock after it settles, panics included.

use crate::domain::config::QueueConfig;
use crate::domain::task::{package, Job, TaskCounters, TaskHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{trace, warn};

/// Snapshot of queue state. Reading it has no side effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks waiting for a slot
    pub pending: usize,
    /// Tasks currently running
    pub running: usize,
    pub concurrency_limit: usize,
    pub completed: u64,
    pub panicked: u64,
}

struct QueueState {
    pending: VecDeque<Job>,
    running: usize,
}

struct QueueInner {
    state: Mutex<QueueState>,
    limit: usize,
    counters: TaskCounters,
}

/// FIFO executor with a global concurrency cap.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

impl WorkQueue {
    /// Create a queue running at most `concurrency_limit` tasks at once.
    ///
    /// A limit of zero would never start anything and is raised to one.
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        if concurrency_limit == 0 {
            warn!("Work queue concurrency limit of 0 raised to 1");
        }
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: 0,
                }),
                limit: concurrency_limit.max(1),
                counters: TaskCounters::default(),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.concurrency_limit)
    }

    /// Append `task` to the queue, starting it now if a slot is free.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn submit<F, Fut, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = package(task);
        self.inner.counters.submitted();
        self.inner.state.lock().pending.push_back(job);
        pump(&self.inner);
        handle
    }

    pub fn concurrency_limit(&self) -> usize {
        self.inner.limit
    }

    pub fn stats(&self) -> QueueStats {
        let (pending, running) = {
            let state = self.inner.state.lock();
            (state.pending.len(), state.running)
        };
        QueueStats {
            pending,
            running,
            concurrency_limit: self.inner.limit,
            completed: self.inner.counters.completed.load(Ordering::Relaxed),
            panicked: self.inner.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Start pending jobs while slots are free.
fn pump(inner: &Arc<QueueInner>) {
    loop {
        let job = {
            let mut state = inner.state.lock();
            if state.running >= inner.limit {
                return;
            }
            let Some(job) = state.pending.pop_front() else {
                return;
            };
            state.running += 1;
            trace!(running = state.running, pending = state.pending.len(), "Work queue slot claimed");
            job
        };

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let settled = job.await;
            inner.counters.record(settled);
            inner.state.lock().running -= 1;
            pump(&inner);
        });
    }
}
