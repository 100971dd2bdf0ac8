//! Session pipeline - composes the core components into one event path.
//!
//! ```text
//! event ──▶ Deduplicator ──dup──▶ dropped
//!               │
//!               ▼
//!        KeySerializer[session]
//!               │  (this session's turn)
//!               ▼
//!        CooldownGate.wait ──▶ handler ──▶ CooldownGate.record
//! ```
//!
//! Provider calls made inside handlers go through [`SessionPipeline::work_queue`].

use crate::domain::config::CoreConfig;
use crate::domain::cooldown::CooldownGate;
use crate::domain::dedup::{DedupStats, Deduplicator};
use crate::domain::errors::{ConfigError, StoreError, TaskError};
use crate::domain::serializer::{KeySerializer, SerializerStats};
use crate::domain::task::{panic_message, TaskHandle};
use crate::domain::work_queue::{QueueStats, WorkQueue};
use crate::ports::inbound::InboundEvent;
use crate::ports::outbound::{TimeSource, TokioTimeSource};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How one handler run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome<T, E> {
    /// Handler returned `Ok`
    Completed(T),
    /// Handler returned `Err`
    Failed(E),
    /// Handler exceeded the configured timeout and was dropped
    TimedOut,
    /// Handler panicked
    Panicked(String),
}

impl<T, E> HandlerOutcome<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
            Self::Panicked(_) => "panicked",
        }
    }
}

/// Result of handing an event to the pipeline.
#[derive(Debug)]
pub enum Dispatch<T, E> {
    /// Event id seen within the dedup window; nothing was scheduled.
    Duplicate,
    /// Event accepted; the handle resolves once its handler has run.
    Queued(TaskHandle<HandlerOutcome<T, E>>),
}

/// Aggregated pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub duplicates: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub panicked: u64,
    /// Sessions with a remembered completion time
    pub cooldown_entries: usize,
    pub dedup: DedupStats,
    pub serializer: SerializerStats,
    pub queue: QueueStats,
}

#[derive(Debug, Default)]
struct PipelineCounters {
    received: AtomicU64,
    duplicates: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    panicked: AtomicU64,
}

impl PipelineCounters {
    fn record<T, E>(&self, outcome: &HandlerOutcome<T, E>) {
        let counter = match outcome {
            HandlerOutcome::Completed(_) => &self.completed,
            HandlerOutcome::Failed(_) => &self.failed,
            HandlerOutcome::TimedOut => &self.timed_out,
            HandlerOutcome::Panicked(_) => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Dedup, per-session ordering, cooldown and provider concurrency in one
/// object owned by the event loop.
pub struct SessionPipeline {
    config: CoreConfig,
    dedup: Arc<Deduplicator>,
    cooldown: Arc<CooldownGate>,
    serializer: KeySerializer,
    queue: WorkQueue,
    counters: Arc<PipelineCounters>,
    shut_down: AtomicBool,
}

impl SessionPipeline {
    /// Build a pipeline on the tokio monotonic clock.
    pub fn new(config: CoreConfig) -> Result<Self, ConfigError> {
        Self::with_time_source(config, Arc::new(TokioTimeSource::new()))
    }

    /// Build a pipeline whose stores read `clock`.
    pub fn with_time_source(
        config: CoreConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            dedup: Arc::new(Deduplicator::with_time_source(
                &config.dedup,
                Arc::clone(&clock),
            )),
            cooldown: Arc::new(CooldownGate::with_time_source(&config.cooldown, clock)),
            serializer: KeySerializer::new(),
            queue: WorkQueue::from_config(&config.queue),
            counters: Arc::default(),
            shut_down: AtomicBool::new(false),
            config,
        })
    }

    /// Accept `event`, or drop it as a duplicate.
    ///
    /// Ordering is fixed here: events of one session run in the order
    /// `dispatch` was called for them. Events without an id bypass the
    /// duplicate check.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn dispatch<H, Fut, T, E>(&self, event: InboundEvent, handler: H) -> Dispatch<T, E>
    where
        H: FnOnce(InboundEvent) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if event.event_id.is_empty() {
            debug!(session = %event.session_key, "Event without id, skipping dedup");
        } else if self.dedup.check_and_mark(&event.event_id) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(
                session = %event.session_key,
                event_id = %event.event_id,
                "Duplicate event dropped"
            );
            return Dispatch::Duplicate;
        }

        let lane = event.session_key.clone();
        let session = lane.clone();
        let cooldown = Arc::clone(&self.cooldown);
        let counters = Arc::clone(&self.counters);
        let timeout = self.config.pipeline.handler_timeout();
        let cooldown_on_failure = self.config.pipeline.cooldown_on_failure;

        let handle = self.serializer.submit(&lane, move || async move {
            cooldown.wait_if_needed(&session).await;

            let event_id = event.event_id.clone();
            let outcome = run_handler(handler, event, timeout).await;

            if outcome.is_completed() || cooldown_on_failure {
                cooldown.record_completion(&session);
            }
            counters.record(&outcome);

            match &outcome {
                HandlerOutcome::Completed(_) => {
                    debug!(session = %session, event_id = %event_id, "Event handled");
                }
                HandlerOutcome::Panicked(message) => {
                    warn!(session = %session, event_id = %event_id, panic = %message, "Handler panicked");
                }
                other => {
                    warn!(session = %session, event_id = %event_id, outcome = other.label(), "Handler did not complete");
                }
            }
            outcome
        });

        Dispatch::Queued(handle)
    }

    /// Dispatch and wait for the handler.
    ///
    /// Returns `Ok(None)` for a duplicate.
    pub async fn process<H, Fut, T, E>(
        &self,
        event: InboundEvent,
        handler: H,
    ) -> Result<Option<HandlerOutcome<T, E>>, TaskError>
    where
        H: FnOnce(InboundEvent) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        match self.dispatch(event, handler) {
            Dispatch::Duplicate => Ok(None),
            Dispatch::Queued(handle) => handle.await.map(Some),
        }
    }

    /// The bounded queue for external provider calls.
    pub fn work_queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    pub fn serializer(&self) -> &KeySerializer {
        &self.serializer
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Start the dedup and cooldown background sweeps.
    pub fn start_sweepers(&self) -> Result<(), StoreError> {
        self.dedup.start_sweeper(self.config.dedup.sweep_interval())?;
        self.cooldown
            .start_sweeper(self.config.cooldown.sweep_interval())?;
        info!(
            dedup_interval_ms = self.config.dedup.sweep_interval_ms,
            cooldown_interval_ms = self.config.cooldown.sweep_interval_ms,
            "Pipeline sweepers started"
        );
        Ok(())
    }

    pub fn stats(&self) -> PipelineStats {
        let counters = &self.counters;
        PipelineStats {
            received: counters.received.load(Ordering::Relaxed),
            duplicates: counters.duplicates.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            timed_out: counters.timed_out.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            cooldown_entries: self.cooldown.len(),
            dedup: self.dedup.stats(),
            serializer: self.serializer.stats(),
            queue: self.queue.stats(),
        }
    }

    /// Destroy the dedup and cooldown stores. Only the first call has an effect.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.dedup.destroy();
        self.cooldown.destroy();
        info!("Session pipeline shut down");
    }

    /// Whether either background sweep is still active.
    pub fn is_sweeping(&self) -> bool {
        self.dedup.is_sweeping() || self.cooldown.is_sweeping()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Run one handler with panic capture and an optional time bound.
async fn run_handler<H, Fut, T, E>(
    handler: H,
    event: InboundEvent,
    timeout: Option<Duration>,
) -> HandlerOutcome<T, E>
where
    H: FnOnce(InboundEvent) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let run = AssertUnwindSafe(async move { handler(event).await }).catch_unwind();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => return HandlerOutcome::TimedOut,
        },
        None => run.await,
    };

    match result {
        Ok(Ok(value)) => HandlerOutcome::Completed(value),
        Ok(Err(error)) => HandlerOutcome::Failed(error),
        Err(payload) => HandlerOutcome::Panicked(panic_message(payload.as_ref())),
    }
}
