//! # Expiring Store
//!
//! Generic string-keyed map with a per-entry time-to-live.
//!
//! ## Expiry Design
//!
//! - Each entry stores only its deadline; there is no timer per entry
//! - Every read path (`get`, `has`, views) re-checks the deadline and evicts
//!   a stale entry on the spot (lazy expiry)
//! - One optional background sweeper per store reclaims memory for keys that
//!   are never read again; correctness never depends on it
//!
//! ## Ordering
//!
//! Insertion order is preserved and is load-bearing: the deduplicator evicts
//! the oldest-inserted entries first. Overwriting a key keeps its original
//! position, reads never move it.

use crate::domain::errors::StoreError;
use crate::ports::outbound::{TimeSource, Timestamp, TokioTimeSource};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default interval between background sweeps (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Compute `now + ttl` on the millisecond axis.
fn deadline(now: Timestamp, ttl: Duration) -> Timestamp {
    let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    now.saturating_add(ttl_ms)
}

/// A stored value with its deadline.
struct Entry<T> {
    value: T,
    expires_at: Timestamp,
    /// Insertion sequence number, key into `Entries::order`.
    seq: u64,
}

impl<T> Entry<T> {
    fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// The physical entry table: lookup map plus insertion-order index.
struct Entries<T> {
    map: HashMap<String, Entry<T>>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    lazy_evictions: u64,
    swept: u64,
}

impl<T> Entries<T> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            lazy_evictions: 0,
            swept: 0,
        }
    }

    /// Look up a live entry, evicting it if its deadline has passed.
    fn live(&mut self, key: &str, now: Timestamp) -> Option<&Entry<T>> {
        if self.map.get(key)?.is_expired(now) {
            self.remove(key);
            self.lazy_evictions += 1;
            return None;
        }
        self.map.get(key)
    }

    fn insert(&mut self, key: &str, value: T, expires_at: Timestamp) {
        if let Some(entry) = self.map.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.to_owned());
        self.map.insert(
            key.to_owned(),
            Entry {
                value,
                expires_at,
                seq,
            },
        );
    }

    fn remove(&mut self, key: &str) -> Option<Entry<T>> {
        let entry = self.map.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn evict_oldest(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.map.remove(&key);
            evicted += 1;
        }
        evicted
    }

    fn purge_expired(&mut self, now: Timestamp) -> usize {
        let before = self.map.len();
        let order = &mut self.order;
        self.map.retain(|_, entry| {
            if entry.is_expired(now) {
                order.remove(&entry.seq);
                false
            } else {
                true
            }
        });
        let removed = before - self.map.len();
        self.swept += removed as u64;
        removed
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

/// Shared state between a store handle and its sweeper.
struct StoreInner<T> {
    entries: Mutex<Entries<T>>,
    default_ttl: Duration,
    clock: Arc<dyn TimeSource>,
    destroyed: AtomicBool,
}

impl<T> StoreInner<T> {
    fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.entries.lock().purge_expired(now)
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries physically present (may include stale ones).
    pub entries: usize,
    /// Stale entries evicted by a read.
    pub lazy_evictions: u64,
    /// Stale entries removed by sweeps.
    pub swept: u64,
}

/// Compound access to a store under a single lock acquisition.
///
/// Obtained through [`ExpiringStore::with_view`]. All reads apply the same
/// lazy-expiry rule as the store's own methods.
pub struct StoreView<'a, T> {
    entries: &'a mut Entries<T>,
    now: Timestamp,
    default_ttl: Duration,
    writable: bool,
}

impl<T> StoreView<'_, T> {
    /// Whether `key` holds a live entry.
    pub fn has(&mut self, key: &str) -> bool {
        self.entries.live(key, self.now).is_some()
    }

    /// Borrow the live value for `key`.
    pub fn get_ref(&mut self, key: &str) -> Option<&T> {
        self.entries.live(key, self.now).map(|entry| &entry.value)
    }

    /// Store `value` with the default TTL.
    pub fn set(&mut self, key: &str, value: T) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Store `value` expiring `ttl` from now.
    pub fn set_with_ttl(&mut self, key: &str, value: T, ttl: Duration) {
        if self.writable {
            self.entries.insert(key, value, deadline(self.now, ttl));
        }
    }

    /// Remove `key`; returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Entries physically present.
    pub fn len(&self) -> usize {
        self.entries.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.map.is_empty()
    }

    /// Remove the `count` oldest-inserted entries.
    pub fn evict_oldest(&mut self, count: usize) -> usize {
        self.entries.evict_oldest(count)
    }
}

impl<T: Clone> StoreView<'_, T> {
    pub fn get(&mut self, key: &str) -> Option<T> {
        self.get_ref(key).cloned()
    }
}

/// String-keyed map with per-entry TTL and lazy expiry.
///
/// Internally synchronised; every operation is synchronous and never
/// suspends. Destroying the store stops its sweeper and releases all
/// entries; afterwards every operation is a logged no-op.
pub struct ExpiringStore<T> {
    inner: Arc<StoreInner<T>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> ExpiringStore<T> {
    /// Create a store reading the tokio monotonic clock.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_time_source(default_ttl, Arc::new(TokioTimeSource::new()))
    }

    /// Create a store with a custom time source.
    #[must_use]
    pub fn with_time_source(default_ttl: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(Entries::new()),
                default_ttl,
                clock,
                destroyed: AtomicBool::new(false),
            }),
            sweeper: Mutex::new(None),
        }
    }

    /// TTL applied by `set` and `update`.
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Store `value` with the default TTL, replacing any previous entry.
    pub fn set(&self, key: &str, value: T) {
        self.set_with_ttl(key, value, self.inner.default_ttl);
    }

    /// Store `value` expiring `ttl` from now.
    ///
    /// Overwrites reset the deadline; they never stack.
    pub fn set_with_ttl(&self, key: &str, value: T, ttl: Duration) {
        if self.rejects("set") {
            return;
        }
        let now = self.inner.clock.now();
        self.inner
            .entries
            .lock()
            .insert(key, value, deadline(now, ttl));
    }

    /// Live value for `key`, evicting it if stale.
    pub fn get(&self, key: &str) -> Option<T>
    where
        T: Clone,
    {
        if self.rejects("get") {
            return None;
        }
        let now = self.inner.clock.now();
        self.inner
            .entries
            .lock()
            .live(key, now)
            .map(|entry| entry.value.clone())
    }

    /// Whether `key` holds a live entry, evicting it if stale.
    pub fn has(&self, key: &str) -> bool {
        if self.rejects("has") {
            return false;
        }
        let now = self.inner.clock.now();
        self.inner.entries.lock().live(key, now).is_some()
    }

    /// Remove `key` unconditionally. Idempotent.
    pub fn delete(&self, key: &str) -> bool {
        if self.rejects("delete") {
            return false;
        }
        self.inner.entries.lock().remove(key).is_some()
    }

    /// Read-modify-write with the default TTL.
    ///
    /// `f` receives the live value (or `None`) and returns the replacement.
    /// The whole sequence runs under the store lock.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(Option<&T>) -> T,
    {
        self.update_with_ttl(key, f, self.inner.default_ttl);
    }

    /// Read-modify-write storing the result with `ttl`.
    pub fn update_with_ttl<F>(&self, key: &str, f: F, ttl: Duration)
    where
        F: FnOnce(Option<&T>) -> T,
    {
        if self.rejects("update") {
            return;
        }
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.lock();
        let next = f(entries.live(key, now).map(|entry| &entry.value));
        entries.insert(key, next, deadline(now, ttl));
    }

    /// Run a compound operation under one lock acquisition.
    ///
    /// The closure must not block or re-enter this store.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut StoreView<'_, T>) -> R) -> R {
        let writable = !self.rejects("with_view");
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.lock();
        let mut view = StoreView {
            entries: &mut *entries,
            now,
            default_ttl: self.inner.default_ttl,
            writable,
        };
        f(&mut view)
    }

    /// Entries physically present, including stale ones not yet evicted.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the `count` oldest-inserted entries.
    pub fn evict_oldest(&self, count: usize) -> usize {
        if self.rejects("evict_oldest") {
            return 0;
        }
        self.inner.entries.lock().evict_oldest(count)
    }

    /// Run one sweep pass now. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        if self.rejects("sweep") {
            return 0;
        }
        self.inner.sweep()
    }

    /// Start the periodic background sweep on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - `StoreError::Destroyed` - The store was destroyed
    /// - `StoreError::SweeperRunning` - A sweeper is already active
    /// - `StoreError::NoRuntime` - Called outside a tokio runtime
    pub fn start_sweeper(&self, interval: Duration) -> Result<(), StoreError> {
        if self.is_destroyed() {
            return Err(StoreError::Destroyed);
        }

        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(StoreError::SweeperRunning);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let interval = interval.max(Duration::from_millis(1));
        let weak = Arc::downgrade(&self.inner);
        *sweeper = Some(runtime.spawn(sweep_loop(weak, interval)));

        debug!(interval_ms = interval.as_millis() as u64, "Expiring store sweeper started");
        Ok(())
    }

    /// Whether a background sweeper is currently active.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the sweeper and release all entries.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            debug!("Expiring store already destroyed");
            return;
        }
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        let mut entries = self.inner.entries.lock();
        let released = entries.map.len();
        entries.clear();
        debug!(released, "Expiring store destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StoreStats {
        let entries = self.inner.entries.lock();
        StoreStats {
            entries: entries.map.len(),
            lazy_evictions: entries.lazy_evictions,
            swept: entries.swept,
        }
    }

    /// Log and report use after `destroy()`.
    fn rejects(&self, operation: &'static str) -> bool {
        let destroyed = self.is_destroyed();
        if destroyed {
            warn!(operation, "Operation on destroyed expiring store ignored");
        }
        destroyed
    }
}

impl<T> Drop for ExpiringStore<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

/// Background sweep cycle. Exits once the store is gone or destroyed.
async fn sweep_loop<T>(inner: Weak<StoreInner<T>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.destroyed.load(Ordering::SeqCst) {
            break;
        }
        let removed = inner.sweep();
        if removed > 0 {
            debug!(removed, "Swept expired entries");
        }
    }
}
