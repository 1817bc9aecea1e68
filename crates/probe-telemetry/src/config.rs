//! Logging configuration from environment variables.

use std::env;

/// Configuration for log output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to startup log lines
    pub service_name: String,

    /// Log filter (trace, debug, info, warn, error, or `EnvFilter` directives)
    pub log_level: String,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "probe".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PROBE_SERVICE_NAME`: Service name (default: probe)
    /// - `PROBE_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `PROBE_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `PROBE_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("PROBE_SERVICE_NAME").unwrap_or_else(|_| "probe".to_string()),

            log_level: env::var("PROBE_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("PROBE_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("PROBE_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Configuration for embedding hosts that only want errors.
    pub fn quiet() -> Self {
        Self {
            log_level: "warn".to_string(),
            ..Self::default()
        }
    }
}
