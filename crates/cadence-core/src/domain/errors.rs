//! Error types for the session core.
//!
//! Caller misuse (empty keys) and capacity pressure are never surfaced as
//! errors; they are logged and absorbed where they happen. What remains here
//! are lifecycle errors, task failures seen by the awaiting caller, and
//! configuration rejections.

use thiserror::Error;

/// Errors from expiring store lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A background sweep needs a tokio runtime to run on.
    #[error("No tokio runtime available to run the sweeper")]
    NoRuntime,

    /// The sweeper was already started for this store.
    #[error("Sweeper already running")]
    SweeperRunning,

    /// The store was destroyed.
    #[error("Store has been destroyed")]
    Destroyed,
}

/// Failure of a submitted task as seen by whoever awaits its handle.
///
/// Ordinary task errors travel inside the task's own output type; this enum
/// only covers the cases where no output exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task panicked while running.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before it produced an output.
    #[error("Task abandoned before completion")]
    Abandoned,
}

/// Configuration validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A TTL or window that must be positive is zero.
    #[error("{0} cannot be 0")]
    ZeroTtl(&'static str),

    /// A capacity that must be positive is zero.
    #[error("{0} capacity cannot be 0")]
    ZeroCapacity(&'static str),

    /// The work queue would never start anything.
    #[error("Work queue concurrency limit cannot be 0")]
    ZeroConcurrency,

    /// A periodic interval is zero.
    #[error("{0} interval cannot be 0")]
    ZeroInterval(&'static str),

    /// An environment variable holds an unparsable value.
    #[error("Invalid value {value:?} for environment variable {var}")]
    Env { var: String, value: String },
}
