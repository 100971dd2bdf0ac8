//! # Cadence Runtime
//!
//! Drives the session pipeline from an [`EventSource`]:
//!
//! ```text
//! EventSource ──next_event──▶ SessionRuntime::run
//!                                  │ dispatch (arrival order)
//!                                  ▼
//!                           SessionPipeline ──▶ ReplyHandler ──▶ WorkQueue ──▶ ResponseProvider
//!                                  │
//!                                  ▼
//!                     outcome observers (metrics, logs)
//! ```
//!
//! ## Modules
//!
//! - `container/` - Configuration and component wiring
//! - `adapters/` - Event sources and the development provider
//! - `handlers/` - Reply handler and session memory
//!
//! ## Shutdown
//!
//! 1. The event loop stops reading on EOF or when a [`ShutdownHandle`] fires
//! 2. In-flight events get `shutdown_grace` to finish, then are abandoned
//! 3. All expiring stores are destroyed exactly once
//!
//! A runtime runs once. Its stores are gone after `run` returns, so a second
//! call fails with [`RuntimeError::AlreadyStarted`].

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod container;
pub mod handlers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cadence_core::{
    ConfigError, Dispatch, EventSource, HandlerOutcome, PipelineStats, ResponseProvider,
    TaskHandle,
};
use cadence_telemetry::{
    HistogramTimer, ACTIVE_SESSIONS, DEDUP_ENTRIES, EVENTS_DUPLICATE, EVENTS_RECEIVED,
    EVENT_OUTCOMES, HANDLER_DURATION, QUEUE_PENDING, QUEUE_RUNNING,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::container::{RuntimeConfig, RuntimeContainer};
use crate::handlers::{Reply, ReplyError};

/// Event loop errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// `run` was already called on this runtime.
    #[error("Session runtime already started; its stores are released when a run ends")]
    AlreadyStarted,
}

/// Cloneable trigger that stops a running [`SessionRuntime`].
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // No receivers left means the runtime is already gone.
        let _ = self.tx.send(true);
    }
}

/// The event loop around one [`SessionPipeline`](cadence_core::SessionPipeline).
pub struct SessionRuntime {
    container: RuntimeContainer,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    started: AtomicBool,
    replies: Option<mpsc::UnboundedSender<Reply>>,
}

impl SessionRuntime {
    pub fn new(
        config: RuntimeConfig,
        provider: Arc<dyn ResponseProvider>,
    ) -> Result<Self, ConfigError> {
        let container = RuntimeContainer::new(config, provider)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            container,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            started: AtomicBool::new(false),
            replies: None,
        })
    }

    /// Forward every completed [`Reply`] to `sink`, in completion order.
    #[must_use]
    pub fn with_reply_sink(mut self, sink: mpsc::UnboundedSender<Reply>) -> Self {
        self.replies = Some(sink);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    pub fn container(&self) -> &RuntimeContainer {
        &self.container
    }

    /// Consume events until the source closes or shutdown is triggered,
    /// then drain in-flight work and release all stores.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::AlreadyStarted` - A previous or concurrent call owns
    ///   this runtime; `source` is not read
    pub async fn run<S: EventSource>(&self, mut source: S) -> Result<PipelineStats, RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) || self.container.pipeline.is_shut_down() {
            warn!("Session runtime already started, refusing to run again");
            return Err(RuntimeError::AlreadyStarted);
        }
        if let Err(e) = self.container.start_sweepers() {
            warn!(error = %e, "Background sweepers not started");
        }
        info!("Session runtime started");

        let mut shutdown = self.shutdown_rx.clone();
        let mut in_flight = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                info!("Shutdown signal received");
                break;
            }
            let event = tokio::select! {
                _ = shutdown.changed() => continue,
                event = source.next_event() => event,
            };
            let Some(event) = event else {
                info!("Event source exhausted");
                break;
            };

            EVENTS_RECEIVED.inc();
            let handler = Arc::clone(&self.container.handler);
            let dispatched = self.container.pipeline.dispatch(event, move |event| async move {
                let _timer = HistogramTimer::new(&HANDLER_DURATION);
                handler.handle(event).await
            });

            match dispatched {
                Dispatch::Duplicate => EVENTS_DUPLICATE.inc(),
                Dispatch::Queued(handle) => {
                    in_flight.spawn(observe(handle, self.replies.clone()));
                }
            }

            // Reap observers that already finished.
            while in_flight.try_join_next().is_some() {}
            self.publish_gauges();
        }

        self.drain(in_flight).await;
        self.container.shutdown();
        self.publish_gauges();

        let stats = self.container.pipeline.stats();
        info!(
            received = stats.received,
            duplicates = stats.duplicates,
            completed = stats.completed,
            failed = stats.failed,
            timed_out = stats.timed_out,
            "Session runtime stopped"
        );
        Ok(stats)
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        let pending = in_flight.len();
        if pending == 0 {
            return;
        }
        info!(pending, "Waiting for in-flight events");

        let grace = self.container.config.shutdown_grace();
        let drained = tokio::time::timeout(grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = in_flight.len(),
                grace_ms = grace.as_millis() as u64,
                "Shutdown grace elapsed, abandoning in-flight events"
            );
            in_flight.abort_all();
        }
    }

    fn publish_gauges(&self) {
        let stats = self.container.pipeline.stats();
        ACTIVE_SESSIONS.set(stats.serializer.active_keys as f64);
        QUEUE_RUNNING.set(stats.queue.running as f64);
        QUEUE_PENDING.set(stats.queue.pending as f64);
        DEDUP_ENTRIES.set(stats.dedup.entries as f64);
    }
}

/// Await one event's outcome and report it.
async fn observe(
    handle: TaskHandle<HandlerOutcome<Reply, ReplyError>>,
    sink: Option<mpsc::UnboundedSender<Reply>>,
) {
    match handle.await {
        Ok(outcome) => {
            EVENT_OUTCOMES.with_label_values(&[outcome.label()]).inc();
            match outcome {
                HandlerOutcome::Completed(reply) => {
                    info!(
                        session = %reply.session_key,
                        event_id = %reply.event_id,
                        reply = %reply.text,
                        "Reply ready"
                    );
                    if let Some(sink) = sink {
                        if sink.send(reply).is_err() {
                            warn!("Reply sink closed, reply dropped");
                        }
                    }
                }
                HandlerOutcome::Failed(e) => warn!(error = %e, "Event failed"),
                HandlerOutcome::TimedOut | HandlerOutcome::Panicked(_) => {}
            }
        }
        Err(e) => error!(error = %e, "Event task lost"),
    }
}
