//! # Cadence Core - Per-Session Concurrency and State Expiry
//!
//! Building blocks for a message-driven service that talks to a slow,
//! rate-limited external provider on behalf of many independent sessions.
//!
//! ## Components
//!
//! | Component | Type | Role |
//! |-----------|------|------|
//! | Expiring Store | [`ExpiringStore`] | String-keyed map with per-entry TTL and lazy expiry |
//! | Deduplicator | [`Deduplicator`] | Suppresses repeated event ids inside a window, bounded size |
//! | Cooldown Gate | [`CooldownGate`] | Minimum spacing between completions per session |
//! | Per-Key Serializer | [`KeySerializer`] | One-at-a-time FIFO execution per key |
//! | Bounded Work Queue | [`WorkQueue`] | Global cap on concurrently running tasks |
//! | Session Pipeline | [`SessionPipeline`] | All of the above wired into one event path |
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Expired entries are never returned | `domain/store.rs` - `Entries::live()` |
//! | Dedup size never exceeds `max_entries` | `domain/dedup.rs` - `Deduplicator::insert()` |
//! | Concurrent `check_and_mark` admits an id once | `domain/dedup.rs` - single `with_view` lock |
//! | Same-key tasks never overlap, run in submission order | `domain/serializer.rs` - one worker per lane |
//! | Idle keys hold no serializer state | `domain/serializer.rs` - `drain_lane()` teardown |
//! | `running <= concurrency_limit` | `domain/work_queue.rs` - `pump()` |
//! | A failed or panicked task never blocks followers | `domain/task.rs` - `package()` |
//!
//! ## Usage
//!
//! ```ignore
//! use cadence_core::{CoreConfig, Dispatch, InboundEvent, SessionPipeline};
//!
//! let pipeline = SessionPipeline::new(CoreConfig::default())?;
//! pipeline.start_sweepers()?;
//!
//! let event = InboundEvent::new("chat-42", "msg-1001", "hello");
//! if let Dispatch::Queued(handle) = pipeline.dispatch(event, |event| async move {
//!     Ok::<_, ProviderError>(event.text.len())
//! }) {
//!     let outcome = handle.await?;
//! }
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use domain::{
    ConfigError, CooldownConfig, CooldownGate, CoreConfig, DedupConfig, DedupStats, Deduplicator,
    ExpiringStore, KeySerializer, PipelineConfig, QueueConfig, QueueStats, SerializerStats,
    StoreError, StoreStats, StoreView, TaskError, TaskHandle, WorkQueue, DEFAULT_SWEEP_INTERVAL,
};
pub use ports::{
    EventSource, InboundEvent, ManualTimeSource, ProviderError, ResponseProvider, TimeSource,
    Timestamp, TokioTimeSource,
};
pub use service::{Dispatch, HandlerOutcome, PipelineStats, SessionPipeline};
