//! Service registry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How long a discovery result stays cached per filter
    pub discovery_cache_ttl_seconds: u64,
    /// Probe a service as part of registering it
    pub probe_on_register: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            discovery_cache_ttl_seconds: 60,
            probe_on_register: true,
        }
    }
}

impl RegistryConfig {
    pub fn discovery_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_cache_ttl_seconds)
    }
}
