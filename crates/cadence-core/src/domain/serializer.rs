//! # Per-Key Serializer
//!
//! Runs tasks sharing a key strictly one at a time in submission order,
//! while tasks for different keys run concurrently.
//!
//! ## Lanes
//!
//! Each busy key owns a lane: an unbounded channel of jobs plus one worker
//! task draining it. A lane is created when a job arrives for an idle key and
//! is removed by its worker once the channel is empty.
//!
//! ```text
//! submit(k, job) ──▶ lanes[k] exists? ──yes──▶ send on lane channel
//!                          │
//!                          no
//!                          ▼
//!                 create lane, send, spawn worker
//!
//! worker: run jobs in order ──▶ channel empty? ──▶ remove lane, exit
//! ```
//!
//! Sending and teardown both happen under the lane map's shard lock for the
//! key: the worker's final emptiness check runs inside `remove_if`, so a job
//! can never land in a lane that is about to disappear.
//!
//! Jobs never unwind (see [`task`](crate::domain::task)), so a failing or
//! panicking task cannot stall its key. A task that never finishes does.

use crate::domain::task::{package, Job, TaskCounters, TaskHandle};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

type Lanes = DashMap<String, UnboundedSender<Job>>;

/// Snapshot of serializer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerStats {
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
    /// Keys with queued or running work
    pub active_keys: usize,
}

/// Per-key FIFO executor.
#[derive(Clone, Default)]
pub struct KeySerializer {
    lanes: Arc<Lanes>,
    counters: Arc<TaskCounters>,
}

impl KeySerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` behind every earlier task submitted for `key`.
    ///
    /// The handle resolves to this task's output, or to a [`TaskError`]
    /// if it panicked. An empty key is a caller error: it is logged and the
    /// task runs on its own, unserialised.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    ///
    /// [`TaskError`]: crate::domain::errors::TaskError
    pub fn submit<F, Fut, T>(&self, key: &str, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = package(task);
        self.counters.submitted();

        if key.is_empty() {
            warn!("Serializer submit with empty key, running unserialised");
            let counters = Arc::clone(&self.counters);
            tokio::spawn(async move { counters.record(job.await) });
            return handle;
        }

        self.enqueue(key, job);
        handle
    }

    /// Keys with queued or running work.
    pub fn active_keys(&self) -> usize {
        self.lanes.len()
    }

    /// Whether `key` currently has a lane.
    pub fn is_active(&self, key: &str) -> bool {
        self.lanes.contains_key(key)
    }

    pub fn stats(&self) -> SerializerStats {
        SerializerStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            active_keys: self.lanes.len(),
        }
    }

    fn enqueue(&self, key: &str, job: Job) {
        let receiver = match self.lanes.entry(key.to_owned()) {
            Entry::Occupied(mut lane) => match lane.get().send(job) {
                Ok(()) => return,
                Err(SendError(job)) => {
                    // Only happens if the worker was dropped with the runtime.
                    warn!(key, "Serializer lane worker gone, starting a new one");
                    let (sender, receiver) = open_lane(job);
                    lane.insert(sender);
                    receiver
                }
            },
            Entry::Vacant(slot) => {
                let (sender, receiver) = open_lane(job);
                slot.insert(sender);
                receiver
            }
        };

        debug!(key, "Serializer lane opened");
        tokio::spawn(drain_lane(
            Arc::clone(&self.lanes),
            key.to_owned(),
            receiver,
            Arc::clone(&self.counters),
        ));
    }
}

fn open_lane(first: Job) -> (UnboundedSender<Job>, UnboundedReceiver<Job>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    // The receiver is alive, so this cannot fail.
    let _ = sender.send(first);
    (sender, receiver)
}

/// Lane worker: run jobs in order, then tear the lane down once empty.
async fn drain_lane(
    lanes: Arc<Lanes>,
    key: String,
    mut receiver: UnboundedReceiver<Job>,
    counters: Arc<TaskCounters>,
) {
    loop {
        while let Ok(job) = receiver.try_recv() {
            counters.record(job.await);
        }

        let mut straggler = None;
        lanes.remove_if(&key, |_, _| match receiver.try_recv() {
            Ok(job) => {
                straggler = Some(job);
                false
            }
            Err(_) => true,
        });

        match straggler {
            Some(job) => counters.record(job.await),
            None => break,
        }
    }
    debug!(key = %key, "Serializer lane drained");
}
