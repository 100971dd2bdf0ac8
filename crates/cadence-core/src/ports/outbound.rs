//! Outbound (Driven) ports for the session core.
//!
//! These traits define the dependencies the core reaches out to: a clock for
//! expiry decisions and the slow external response provider that handlers
//! call through the bounded work queue.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Milliseconds on the time source's own monotonic axis.
pub type Timestamp = u64;

/// Time source for expiry and cooldown bookkeeping.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default time source backed by the tokio monotonic clock.
///
/// Reads `tokio::time::Instant`, so a paused test runtime
/// (`tokio::time::pause`) also freezes expiry and cooldown decisions.
#[derive(Debug, Clone, Copy)]
pub struct TokioTimeSource {
    origin: tokio::time::Instant,
}

impl TokioTimeSource {
    /// Create a time source whose zero is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioTimeSource {
    fn now(&self) -> Timestamp {
        tokio::time::Instant::now()
            .saturating_duration_since(self.origin)
            .as_millis() as Timestamp
    }
}

/// Manually driven time source for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    time: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

/// Errors reported by the external response provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached or timed out.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request (quota, content policy, ...).
    #[error("Provider rejected request: {0}")]
    Rejected(String),
}

/// The slow, rate-limited generative-response provider.
///
/// Implementations are plain request/response calls. Callers are expected to
/// route every call through the [`WorkQueue`](crate::WorkQueue) so the global
/// concurrency cap holds.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    /// Produce a reply for `prompt` in the context of `session_key`.
    async fn generate(&self, session_key: &str, prompt: &str) -> Result<String, ProviderError>;
}
