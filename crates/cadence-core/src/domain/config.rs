//! Core configuration with validation.
//!
//! Durations are carried as millisecond integers so the structs deserialize
//! from any serde format without extra adapters.

use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete core configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Duplicate suppression
    pub dedup: DedupConfig,
    /// Per-session spacing
    pub cooldown: CooldownConfig,
    /// Global concurrency cap for the external provider
    pub queue: QueueConfig,
    /// Event pipeline behaviour
    pub pipeline: PipelineConfig,
}

impl CoreConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dedup.validate()?;
        self.cooldown.validate()?;
        self.queue.validate()?;
        self.pipeline.validate()
    }
}

/// Deduplicator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// How long a seen event id is remembered (default: 10 minutes)
    pub ttl_ms: u64,
    /// Capacity before oldest-first batch eviction (default: 10 000)
    pub max_entries: usize,
    /// Background sweep interval (default: 5 minutes)
    pub sweep_interval_ms: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 600_000,
            max_entries: 10_000,
            sweep_interval_ms: 300_000,
        }
    }
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == 0 {
            return Err(ConfigError::ZeroTtl("dedup ttl"));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::ZeroCapacity("dedup"));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("dedup sweep"));
        }
        Ok(())
    }
}

/// Cooldown gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Minimum spacing between completions for one session (default: 2s).
    /// Zero disables waiting.
    pub window_ms: u64,
    /// Background sweep interval (default: 5 minutes)
    pub sweep_interval_ms: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            window_ms: 2_000,
            sweep_interval_ms: 300_000,
        }
    }
}

impl CooldownConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("cooldown sweep"));
        }
        Ok(())
    }
}

/// Bounded work queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum tasks running at once (default: 3)
    pub concurrency_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// Session pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on one handler run; `None` lets handlers run unbounded
    /// (default: 60s)
    pub handler_timeout_ms: Option<u64>,
    /// Record a cooldown completion after failed or timed-out handlers
    /// (default: true)
    pub cooldown_on_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: Some(60_000),
            cooldown_on_failure: true,
        }
    }
}

impl PipelineConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handler_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTtl("handler timeout"));
        }
        Ok(())
    }
}
