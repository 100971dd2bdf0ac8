//! # Event Deduplicator
//!
//! Answers "have I seen this event id before" for a bounded time window.
//!
//! ## Design
//!
//! - Seen ids are markers in an [`ExpiringStore`], forgotten after the TTL
//! - Capacity is bounded: when full, the oldest 10% of entries by insertion
//!   order are evicted in one batch before the next insert. Membership checks
//!   do not refresh an entry's position, so this approximates LRU rather than
//!   implementing it
//! - `check_and_mark` tests and records under one store lock, so two
//!   concurrent deliveries of the same id can never both pass

use crate::domain::config::DedupConfig;
use crate::domain::errors::StoreError;
use crate::domain::store::{ExpiringStore, StoreView};
use crate::ports::outbound::{TimeSource, TokioTimeSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Snapshot of deduplicator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Ids passed to `check_and_mark`
    pub checked: u64,
    /// Ids reported as duplicates
    pub duplicates: u64,
    /// Entries evicted by capacity pressure
    pub evicted: u64,
    /// Entries currently stored
    pub entries: usize,
}

/// Time-windowed, capacity-bounded duplicate filter.
pub struct Deduplicator {
    store: ExpiringStore<()>,
    ttl: Duration,
    max_entries: usize,
    checked: AtomicU64,
    duplicates: AtomicU64,
    evicted: AtomicU64,
}

impl Deduplicator {
    /// Create a deduplicator reading the tokio monotonic clock.
    #[must_use]
    pub fn new(config: &DedupConfig) -> Self {
        Self::with_time_source(config, Arc::new(TokioTimeSource::new()))
    }

    /// Create a deduplicator with a custom time source.
    #[must_use]
    pub fn with_time_source(config: &DedupConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            store: ExpiringStore::with_time_source(config.ttl(), clock),
            ttl: config.ttl(),
            max_entries: config.max_entries.max(1),
            checked: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Whether `id` was seen within the TTL window. Does not record it.
    ///
    /// An empty id is a caller error: it is logged and never a duplicate.
    pub fn is_duplicate(&self, id: &str) -> bool {
        if id.is_empty() {
            warn!("is_duplicate called with empty event id");
            return false;
        }
        self.store.has(id)
    }

    /// Record `id` as seen, evicting the oldest batch first if at capacity.
    pub fn mark_seen(&self, id: &str) {
        if id.is_empty() {
            warn!("mark_seen called with empty event id");
            return;
        }
        self.store.with_view(|view| self.insert(view, id));
    }

    /// Test-and-record in one step.
    ///
    /// # Returns
    ///
    /// - `true` - Duplicate; nothing was mutated and the caller should skip
    /// - `false` - First sighting; the id is already recorded on return
    pub fn check_and_mark(&self, id: &str) -> bool {
        if id.is_empty() {
            warn!("check_and_mark called with empty event id");
            return false;
        }
        self.checked.fetch_add(1, Ordering::Relaxed);

        let duplicate = self.store.with_view(|view| {
            if view.has(id) {
                return true;
            }
            self.insert(view, id);
            false
        });

        if duplicate {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(event_id = id, "Duplicate event suppressed");
        }
        duplicate
    }

    /// Entries physically present.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Start the background sweep of expired markers.
    pub fn start_sweeper(&self, interval: Duration) -> Result<(), StoreError> {
        self.store.start_sweeper(interval)
    }

    pub fn is_sweeping(&self) -> bool {
        self.store.is_sweeping()
    }

    pub fn destroy(&self) {
        self.store.destroy();
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            checked: self.checked.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            entries: self.store.len(),
        }
    }

    /// Entries dropped per capacity eviction: 10% of capacity, at least one.
    fn eviction_batch(&self) -> usize {
        (self.max_entries / 10).max(1)
    }

    fn insert(&self, view: &mut StoreView<'_, ()>, id: &str) {
        let present = view.has(id);
        if !present && view.len() >= self.max_entries {
            let evicted = view.evict_oldest(self.eviction_batch());
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(
                evicted,
                max_entries = self.max_entries,
                "Dedup capacity reached, evicted oldest entries"
            );
        }
        view.set_with_ttl(id, (), self.ttl);
    }
}
