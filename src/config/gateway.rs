//! Dispatch configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool and dispatch defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Workers draining the normal and low priority lanes
    pub workers: usize,
    /// Outbound timeout used when a call does not set one
    pub default_timeout_seconds: u64,
    /// Upper bound an idle worker sleeps before rescanning the lanes
    pub queue_poll_interval_ms: u64,
    /// Bounded wait for background tasks on shutdown
    pub shutdown_timeout_seconds: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            default_timeout_seconds: 30,
            queue_poll_interval_ms: 100,
            shutdown_timeout_seconds: 5,
        }
    }
}

impl DispatchConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}
