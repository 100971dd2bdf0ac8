//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Logging and metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` directive such as `cadence_core=debug,info`)
    pub log_level: String,

    /// Whether to write logs at all
    pub console_output: bool,

    /// Whether to format logs as JSON
    pub json_logs: bool,

    /// Whether to register the Prometheus collectors
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "cadence".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CADENCE_SERVICE_NAME`: Service name (default: cadence)
    /// - `CADENCE_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `CADENCE_CONSOLE_OUTPUT`: Enable log output (default: true)
    /// - `CADENCE_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `CADENCE_METRICS`: Register Prometheus collectors (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("CADENCE_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("CADENCE_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: lookup("CADENCE_CONSOLE_OUTPUT")
                .map(|v| is_truthy(&v))
                .unwrap_or(defaults.console_output),

            json_logs: lookup("CADENCE_JSON_LOGS")
                .map(|v| is_truthy(&v))
                .unwrap_or(is_container),

            metrics_enabled: lookup("CADENCE_METRICS")
                .map(|v| is_truthy(&v))
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value != "false" && value != "0" && value != "off" && !value.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "cadence");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(TelemetryConfig::from_lookup(lookup(&[])), TelemetryConfig::default());
    }

    #[test]
    fn test_log_level_prefers_cadence_variable() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("RUST_LOG", "warn"),
            ("CADENCE_LOG_LEVEL", "debug"),
        ]));
        assert_eq!(config.log_level, "debug");

        let config = TelemetryConfig::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_container_defaults_to_json() {
        let config = TelemetryConfig::from_lookup(lookup(&[("DOCKER_CONTAINER", "1")]));
        assert!(config.json_logs);

        let config = TelemetryConfig::from_lookup(lookup(&[
            ("DOCKER_CONTAINER", "1"),
            ("CADENCE_JSON_LOGS", "false"),
        ]));
        assert!(!config.json_logs);
    }

    #[test]
    fn test_flags_parse() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("CADENCE_CONSOLE_OUTPUT", "0"),
            ("CADENCE_METRICS", "off"),
        ]));
        assert!(!config.console_output);
        assert!(!config.metrics_enabled);
    }
}
