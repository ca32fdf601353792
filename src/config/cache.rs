//! Response cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for caching successful gateway responses.
///
/// # Example
///
/// ```toml
/// [cache]
/// enabled = true
/// ttl_seconds = 300
/// max_size = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false, lookups always miss and nothing is stored.
    pub enabled: bool,

    /// Age at which an entry stops being served.
    ///
    /// Default: 300 seconds
    pub ttl_seconds: u64,

    /// Entry count above which the oldest 10% are evicted.
    ///
    /// Default: 1000
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
            max_size: 1000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}
