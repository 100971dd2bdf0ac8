//! # Cadence Telemetry
//!
//! Structured logging and Prometheus metrics for the Cadence runtime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadence_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env()).expect("telemetry");
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CADENCE_SERVICE_NAME` | `cadence` | Service name in logs |
//! | `CADENCE_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CADENCE_CONSOLE_OUTPUT` | `true` | Write logs at all |
//! | `CADENCE_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `CADENCE_METRICS` | `true` | Register Prometheus collectors |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, ACTIVE_SESSIONS, DEDUP_ENTRIES,
    EVENTS_DUPLICATE, EVENTS_RECEIVED, EVENT_OUTCOMES, HANDLER_DURATION, PROVIDER_CALLS,
    QUEUE_PENDING, QUEUE_RUNNING,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, if enabled, the metrics registry.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if config.metrics_enabled {
        register_metrics()?;
    }
    init_logging(config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active for the life of the process.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
