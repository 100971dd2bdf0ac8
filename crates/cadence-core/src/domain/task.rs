//! Task plumbing shared by the per-key serializer and the work queue.
//!
//! A submitted task is packaged into a type-erased [`Job`] that never
//! unwinds: panics are caught at the job boundary and delivered to the
//! caller's [`TaskHandle`] as [`TaskError::Panicked`]. Whoever drives the job
//! only learns whether it settled normally.

use crate::domain::errors::TaskError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// How a job ended, as seen by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    Completed,
    Panicked,
}

/// A packaged task ready to be driven by an executor.
pub(crate) type Job = Pin<Box<dyn Future<Output = Settled> + Send + 'static>>;

/// Wrap `task` into a [`Job`] and the handle that observes its output.
pub(crate) fn package<F, Fut, T>(task: F) -> (Job, TaskHandle<T>)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let job = async move {
        let result = AssertUnwindSafe(async move { task().await })
            .catch_unwind()
            .await;
        let (settled, output) = match result {
            Ok(value) => (Settled::Completed, Ok(value)),
            Err(payload) => (
                Settled::Panicked,
                Err(TaskError::Panicked(panic_message(payload.as_ref()))),
            ),
        };
        // The caller may have dropped its handle.
        let _ = tx.send(output);
        settled
    };
    (Box::pin(job), TaskHandle { rx })
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Settlement counters kept by an executor.
#[derive(Debug, Default)]
pub(crate) struct TaskCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) panicked: AtomicU64,
}

impl TaskCounters {
    pub(crate) fn submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, settled: Settled) {
        match settled {
            Settled::Completed => self.completed.fetch_add(1, Ordering::Relaxed),
            Settled::Panicked => self.panicked.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Resolves to the output of a submitted task.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
#[must_use = "dropping a TaskHandle discards the task's output"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(output)) => Poll::Ready(output),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
