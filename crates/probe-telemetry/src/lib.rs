//! # Probe Telemetry
//!
//! Installs a `tracing` subscriber for binaries and tests that embed the
//! event hub. Without one, the hub's log output is silently dropped.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use probe_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     init_logging(&TelemetryConfig::from_env()).expect("Failed to init logging");
//!     // Hub log lines are now emitted.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PROBE_SERVICE_NAME` | `probe` | Service name in log lines |
//! | `PROBE_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `PROBE_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PROBE_JSON_LOGS` | `false` | JSON formatted logs |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};

use thiserror::Error;

/// Logging initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Install(String),
}
