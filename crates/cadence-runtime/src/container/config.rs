//! # Runtime Configuration
//!
//! Core settings plus what only the executable needs: session memory bounds,
//! simulated provider latency and shutdown grace. Every value can be
//! overridden from `CADENCE_*` environment variables; an unparsable value is
//! an error rather than a silent fallback.

use cadence_core::{ConfigError, CoreConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Dedup, cooldown, queue and pipeline settings.
    pub core: CoreConfig,
    /// Session memory settings.
    pub memory: MemoryConfig,
    /// Simulated provider settings.
    pub provider: ProviderConfig,
    /// How long shutdown waits for in-flight events (default: 5s).
    pub shutdown_grace_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            memory: MemoryConfig::default(),
            provider: ProviderConfig::default(),
            shutdown_grace_ms: 5_000,
        }
    }
}

/// Per-session conversation memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Idle time after which a session's history is forgotten (default: 30 min).
    pub ttl_ms: u64,
    /// Messages kept per session, oldest dropped first (default: 20).
    pub max_messages: usize,
    /// Background sweep interval for idle histories (default: 5 minutes).
    pub sweep_interval_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 1_800_000,
            max_messages: 20,
            sweep_interval_ms: 300_000,
        }
    }
}

impl MemoryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Simulated response provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base latency of one call (default: 250ms).
    pub latency_ms: u64,
    /// Extra random latency, uniform in `0..=jitter_ms` (default: 100ms).
    pub jitter_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            latency_ms: 250,
            jitter_ms: 100,
        }
    }
}

impl ProviderConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `CADENCE_DEDUP_TTL_MS` | `core.dedup.ttl_ms` |
    /// | `CADENCE_DEDUP_MAX_ENTRIES` | `core.dedup.max_entries` |
    /// | `CADENCE_COOLDOWN_MS` | `core.cooldown.window_ms` |
    /// | `CADENCE_QUEUE_CONCURRENCY` | `core.queue.concurrency_limit` |
    /// | `CADENCE_SWEEP_INTERVAL_MS` | dedup and cooldown `sweep_interval_ms` |
    /// | `CADENCE_HANDLER_TIMEOUT_MS` | `core.pipeline.handler_timeout_ms` (`none` disables) |
    /// | `CADENCE_COOLDOWN_ON_FAILURE` | `core.pipeline.cooldown_on_failure` |
    /// | `CADENCE_MEMORY_TTL_MS` | `memory.ttl_ms` |
    /// | `CADENCE_MEMORY_MAX_MESSAGES` | `memory.max_messages` |
    /// | `CADENCE_MEMORY_SWEEP_INTERVAL_MS` | `memory.sweep_interval_ms` |
    /// | `CADENCE_PROVIDER_LATENCY_MS` | `provider.latency_ms` |
    /// | `CADENCE_PROVIDER_JITTER_MS` | `provider.jitter_ms` |
    /// | `CADENCE_SHUTDOWN_GRACE_MS` | `shutdown_grace_ms` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let core = &mut config.core;

        override_with(&lookup, "CADENCE_DEDUP_TTL_MS", &mut core.dedup.ttl_ms)?;
        override_with(&lookup, "CADENCE_DEDUP_MAX_ENTRIES", &mut core.dedup.max_entries)?;
        override_with(&lookup, "CADENCE_COOLDOWN_MS", &mut core.cooldown.window_ms)?;
        override_with(&lookup, "CADENCE_QUEUE_CONCURRENCY", &mut core.queue.concurrency_limit)?;

        let mut sweep_interval_ms = core.dedup.sweep_interval_ms;
        override_with(&lookup, "CADENCE_SWEEP_INTERVAL_MS", &mut sweep_interval_ms)?;
        core.dedup.sweep_interval_ms = sweep_interval_ms;
        core.cooldown.sweep_interval_ms = sweep_interval_ms;

        if let Some(value) = lookup("CADENCE_HANDLER_TIMEOUT_MS") {
            core.pipeline.handler_timeout_ms = if value.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse("CADENCE_HANDLER_TIMEOUT_MS", &value)?)
            };
        }
        if let Some(value) = lookup("CADENCE_COOLDOWN_ON_FAILURE") {
            core.pipeline.cooldown_on_failure = parse_flag("CADENCE_COOLDOWN_ON_FAILURE", &value)?;
        }

        override_with(&lookup, "CADENCE_MEMORY_TTL_MS", &mut config.memory.ttl_ms)?;
        override_with(&lookup, "CADENCE_MEMORY_MAX_MESSAGES", &mut config.memory.max_messages)?;
        override_with(
            &lookup,
            "CADENCE_MEMORY_SWEEP_INTERVAL_MS",
            &mut config.memory.sweep_interval_ms,
        )?;
        override_with(&lookup, "CADENCE_PROVIDER_LATENCY_MS", &mut config.provider.latency_ms)?;
        override_with(&lookup, "CADENCE_PROVIDER_JITTER_MS", &mut config.provider.jitter_ms)?;
        override_with(&lookup, "CADENCE_SHUTDOWN_GRACE_MS", &mut config.shutdown_grace_ms)?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core.validate()?;
        if self.memory.ttl_ms == 0 {
            return Err(ConfigError::ZeroTtl("session memory ttl"));
        }
        if self.memory.max_messages == 0 {
            return Err(ConfigError::ZeroCapacity("session memory"));
        }
        if self.memory.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("session memory sweep"));
        }
        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn override_with<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    field: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *field = parse(var, &value)?;
    }
    Ok(())
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
