//! # Cooldown Gate
//!
//! Enforces a minimum spacing between successive completions for the same
//! session. The last completion time is kept in an [`ExpiringStore`] with a
//! TTL of twice the longest spacing the gate has been asked to enforce, so
//! idle sessions fall out on their own but a record never expires while a
//! caller could still be waiting on it.

use crate::domain::config::CooldownConfig;
use crate::domain::errors::StoreError;
use crate::domain::store::ExpiringStore;
use crate::ports::outbound::{TimeSource, Timestamp, TokioTimeSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-key minimum-spacing gate.
pub struct CooldownGate {
    store: ExpiringStore<Timestamp>,
    window: Duration,
    /// Longest spacing seen so far in ms, never below the window.
    horizon_ms: AtomicU64,
    clock: Arc<dyn TimeSource>,
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl CooldownGate {
    /// Create a gate reading the tokio monotonic clock.
    #[must_use]
    pub fn new(config: &CooldownConfig) -> Self {
        Self::with_time_source(config, Arc::new(TokioTimeSource::new()))
    }

    /// Create a gate with a custom time source.
    #[must_use]
    pub fn with_time_source(config: &CooldownConfig, clock: Arc<dyn TimeSource>) -> Self {
        let window = config.window();
        Self {
            store: ExpiringStore::with_time_source(window.saturating_mul(2), Arc::clone(&clock)),
            window,
            horizon_ms: AtomicU64::new(as_millis(window)),
            clock,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time since the last recorded completion for `key`, if still remembered.
    pub fn time_since_last(&self, key: &str) -> Option<Duration> {
        if key.is_empty() {
            return None;
        }
        let last = self.store.get(key)?;
        Some(Duration::from_millis(self.clock.now().saturating_sub(last)))
    }

    /// How long a caller would wait right now under the configured window.
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        self.remaining_with_spacing(key, self.window)
    }

    /// How long a caller would wait right now under `min_spacing`.
    pub fn remaining_with_spacing(&self, key: &str, min_spacing: Duration) -> Option<Duration> {
        if min_spacing.is_zero() {
            return None;
        }
        self.extend_horizon(min_spacing);
        let elapsed = self.time_since_last(key)?;
        (elapsed < min_spacing).then(|| min_spacing - elapsed)
    }

    /// Wait out whatever is left of the configured window for `key`.
    pub async fn wait_if_needed(&self, key: &str) {
        self.wait_with_spacing(key, self.window).await;
    }

    /// Wait until at least `min_spacing` has passed since the last completion.
    ///
    /// Suspends only the calling task.
    pub async fn wait_with_spacing(&self, key: &str, min_spacing: Duration) {
        if key.is_empty() {
            warn!("Cooldown wait requested for empty key");
            return;
        }
        if let Some(delay) = self.remaining_with_spacing(key, min_spacing) {
            debug!(key, delay_ms = delay.as_millis() as u64, "Cooling down");
            tokio::time::sleep(delay).await;
        }
    }

    /// Remember that `key` completed just now.
    ///
    /// The record lives for twice the longest spacing requested so far.
    pub fn record_completion(&self, key: &str) {
        self.record_completion_with_spacing(key, self.window);
    }

    /// Remember that `key` completed just now, keeping the record at least
    /// long enough to enforce `min_spacing`.
    pub fn record_completion_with_spacing(&self, key: &str, min_spacing: Duration) {
        if key.is_empty() {
            warn!("Cooldown completion recorded for empty key");
            return;
        }
        let horizon = self.extend_horizon(min_spacing);
        self.store
            .set_with_ttl(key, self.clock.now(), horizon.saturating_mul(2));
    }

    /// How long completion records are currently kept.
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.horizon_ms.load(Ordering::Relaxed)).saturating_mul(2)
    }

    fn extend_horizon(&self, spacing: Duration) -> Duration {
        let spacing_ms = as_millis(spacing);
        let previous = self.horizon_ms.fetch_max(spacing_ms, Ordering::Relaxed);
        Duration::from_millis(previous.max(spacing_ms))
    }

    /// Sessions currently remembered.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn start_sweeper(&self, interval: Duration) -> Result<(), StoreError> {
        self.store.start_sweeper(interval)
    }

    pub fn is_sweeping(&self) -> bool {
        self.store.is_sweeping()
    }

    pub fn destroy(&self) {
        self.store.destroy();
    }
}
