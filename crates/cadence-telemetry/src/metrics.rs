//! Prometheus metrics for the Cadence runtime.
//!
//! All metrics follow the naming convention: `cadence_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., events_received_total)
//! - **Gauge**: Value that can go up or down (e.g., queue_running)
//! - **Histogram**: Distribution of values (e.g., handler_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::time::Instant;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT PIPELINE
    // =========================================================================

    /// Events handed to the pipeline
    pub static ref EVENTS_RECEIVED: Counter = Counter::new(
        "cadence_events_received_total",
        "Total inbound events handed to the pipeline"
    ).expect("metric creation failed");

    /// Events dropped as duplicates
    pub static ref EVENTS_DUPLICATE: Counter = Counter::new(
        "cadence_events_duplicate_total",
        "Total inbound events dropped as duplicates"
    ).expect("metric creation failed");

    /// Handler outcomes
    pub static ref EVENT_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("cadence_events_outcome_total", "Handler runs by outcome"),
        &["outcome"]  // outcome: completed/failed/timed_out/panicked
    ).expect("metric creation failed");

    /// Handler run time, cooldown wait excluded
    pub static ref HANDLER_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cadence_handler_duration_seconds",
            "Time spent inside event handlers"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0])
    ).expect("metric creation failed");

    // =========================================================================
    // SESSIONS AND PROVIDER QUEUE
    // =========================================================================

    /// Sessions with queued or running work
    pub static ref ACTIVE_SESSIONS: Gauge = Gauge::new(
        "cadence_active_sessions",
        "Sessions with queued or running events"
    ).expect("metric creation failed");

    /// Provider calls currently running
    pub static ref QUEUE_RUNNING: Gauge = Gauge::new(
        "cadence_queue_running",
        "Provider calls currently running"
    ).expect("metric creation failed");

    /// Provider calls waiting for a slot
    pub static ref QUEUE_PENDING: Gauge = Gauge::new(
        "cadence_queue_pending",
        "Provider calls waiting for a concurrency slot"
    ).expect("metric creation failed");

    /// Provider call results
    pub static ref PROVIDER_CALLS: CounterVec = CounterVec::new(
        Opts::new("cadence_provider_calls_total", "Provider calls by result"),
        &["result"]  // result: ok/error
    ).expect("metric creation failed");

    /// Remembered event ids
    pub static ref DEDUP_ENTRIES: Gauge = Gauge::new(
        "cadence_dedup_entries",
        "Event ids currently remembered by the deduplicator"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors already registered are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Pipeline
        Box::new(EVENTS_RECEIVED.clone()),
        Box::new(EVENTS_DUPLICATE.clone()),
        Box::new(EVENT_OUTCOMES.clone()),
        Box::new(HANDLER_DURATION.clone()),
        // Sessions and queue
        Box::new(ACTIVE_SESSIONS.clone()),
        Box::new(QUEUE_RUNNING.clone()),
        Box::new(QUEUE_PENDING.clone()),
        Box::new(PROVIDER_CALLS.clone()),
        Box::new(DEDUP_ENTRIES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
