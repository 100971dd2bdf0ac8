//! Per-session conversation memory.
//!
//! A bounded, time-scoped history per session backed by an
//! [`ExpiringStore`]. Every append refreshes the session's TTL, so a session
//! is forgotten after it has been idle for the configured time.

use crate::container::config::MemoryConfig;
use cadence_core::{ExpiringStore, StoreError};
use std::time::Duration;

pub struct SessionMemory {
    store: ExpiringStore<Vec<String>>,
    max_messages: usize,
}

impl SessionMemory {
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        Self::with_store(ExpiringStore::new(config.ttl()), config.max_messages)
    }

    /// Build on a caller-supplied store (custom clock in tests).
    #[must_use]
    pub fn with_store(store: ExpiringStore<Vec<String>>, max_messages: usize) -> Self {
        Self {
            store,
            max_messages: max_messages.max(1),
        }
    }

    /// Append `line` to the session history and return the updated history.
    pub fn append(&self, session: &str, line: impl Into<String>) -> Vec<String> {
        let line = line.into();
        let mut snapshot = Vec::new();
        self.store.update(session, |history| {
            let mut next = history.cloned().unwrap_or_default();
            next.push(line);
            if next.len() > self.max_messages {
                let excess = next.len() - self.max_messages;
                next.drain(..excess);
            }
            snapshot.clone_from(&next);
            next
        });
        snapshot
    }

    /// Current history for `session`, oldest first.
    pub fn history(&self, session: &str) -> Vec<String> {
        self.store.get(session).unwrap_or_default()
    }

    pub fn forget(&self, session: &str) -> bool {
        self.store.delete(session)
    }

    /// Sessions currently remembered.
    pub fn sessions(&self) -> usize {
        self.store.len()
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
