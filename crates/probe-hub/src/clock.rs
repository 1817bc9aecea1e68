//! # Clock Adapter
//!
//! The hub stamps every event with a timestamp at enqueue time. Platforms may
//! supply their own clock; without one the hub falls back to [`SystemClock`].

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of event timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}
