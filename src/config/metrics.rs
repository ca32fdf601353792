//! Metrics export configuration

use serde::{Deserialize, Serialize};

/// Prometheus exporter settings.
///
/// When `listen_addr` is unset, metrics are still recorded but nothing is exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape listener, e.g. "0.0.0.0:9100"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<String>,
}
