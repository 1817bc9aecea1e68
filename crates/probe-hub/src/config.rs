//! # Hub Configuration
//!
//! Plain struct with defaults, overridable from the environment.

use crate::error::HubError;
use std::env;

/// Default worker thread name.
pub const DEFAULT_WORKER_NAME: &str = "probe-event-hub";

/// Event hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Name of the dispatch worker thread.
    pub worker_name: String,

    /// Version reported in the hub's own shared state.
    pub version: String,

    /// Whether the hub publishes its module directory as shared state.
    pub share_hub_state: bool,

    /// Log every dispatched event at debug level.
    pub log_events: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            share_hub_state: true,
            log_events: false,
        }
    }
}

impl HubConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PROBE_HUB_THREAD`: Worker thread name (default: probe-event-hub)
    /// - `PROBE_SHARE_HUB_STATE`: Publish the hub's shared state (default: true)
    /// - `PROBE_LOG_EVENTS`: Log each dispatched event (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_name: env::var("PROBE_HUB_THREAD").unwrap_or(defaults.worker_name),
            version: defaults.version,
            share_hub_state: env::var("PROBE_SHARE_HUB_STATE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.share_hub_state),
            log_events: env::var("PROBE_LOG_EVENTS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.log_events),
        }
    }

    /// Check the configuration before starting a hub.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.worker_name.trim().is_empty() {
            return Err(HubError::Config("worker thread name is empty".into()));
        }
        if self.worker_name.contains('\0') {
            return Err(HubError::Config("worker thread name contains NUL".into()));
        }
        Ok(())
    }
}
