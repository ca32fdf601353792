//! Configuration for health checking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for periodic service health probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Whether the background health loop runs
    pub enabled: bool,
    /// Seconds between health check cycles
    pub interval_seconds: u64,
    /// Timeout for each probe request
    pub timeout_seconds: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 30,
            timeout_seconds: 10,
        }
    }
}

impl HealthCheckConfig {
    /// Time between cycles, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
