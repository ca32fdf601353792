//! Health probing for registered services.
//!
//! A probe issues a plain GET to the service's health check URL and classifies
//! the answer. Probes never return errors: every failure mode is folded into a
//! [`ProbeOutcome`] so one service cannot abort a concurrent check cycle.

mod config;
mod error;

#[cfg(test)]
mod tests;

pub use config::*;
pub use error::*;

use crate::registry::{HealthStatus, ServiceEndpoint};
use std::time::Instant;

/// Classified result of probing one service.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// HTTP 200
    Healthy { latency_ms: f64 },
    /// The service answered with a status other than 200
    Degraded { status_code: u16, latency_ms: f64 },
    /// Connection failure, timeout or unusable URL
    Unhealthy { error: HealthCheckError },
}

impl ProbeOutcome {
    /// Registry status this outcome maps to.
    pub fn status(&self) -> HealthStatus {
        match self {
            ProbeOutcome::Healthy { .. } => HealthStatus::Healthy,
            ProbeOutcome::Degraded { .. } => HealthStatus::Degraded,
            ProbeOutcome::Unhealthy { .. } => HealthStatus::Unhealthy,
        }
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            ProbeOutcome::Healthy { latency_ms } | ProbeOutcome::Degraded { latency_ms, .. } => {
                Some(*latency_ms)
            }
            ProbeOutcome::Unhealthy { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            ProbeOutcome::Healthy { .. } => None,
            ProbeOutcome::Degraded { status_code, .. } => {
                Some(format!("health check returned HTTP {}", status_code))
            }
            ProbeOutcome::Unhealthy { error } => Some(error.to_string()),
        }
    }
}

/// Issues health probes with a pooled HTTP client.
pub struct HealthChecker {
    client: reqwest::Client,
    config: HealthCheckConfig,
}

impl HealthChecker {
    /// Create a health checker with its own HTTP client.
    pub fn new(config: HealthCheckConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build health check client, using defaults");
                reqwest::Client::new()
            });
        Self { client, config }
    }

    /// Create a health checker with a custom HTTP client (for testing).
    pub fn with_client(config: HealthCheckConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Probe a single service.
    pub async fn probe(&self, endpoint: &ServiceEndpoint) -> ProbeOutcome {
        let start = Instant::now();

        let result = self
            .client
            .get(&endpoint.health_check_url)
            .timeout(self.config.timeout())
            .send()
            .await;

        match result {
            Ok(response) => {
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                metrics::histogram!("analytics_gateway_health_probe_seconds",
                    "service" => endpoint.service_id.clone()
                )
                .record(latency_ms / 1000.0);

                let status_code = response.status().as_u16();
                if status_code == 200 {
                    ProbeOutcome::Healthy { latency_ms }
                } else {
                    ProbeOutcome::Degraded {
                        status_code,
                        latency_ms,
                    }
                }
            }
            Err(e) => ProbeOutcome::Unhealthy {
                error: Self::classify_error(e, self.config.timeout_seconds),
            },
        }
    }

    /// Classify reqwest error into HealthCheckError.
    fn classify_error(e: reqwest::Error, timeout_seconds: u64) -> HealthCheckError {
        if e.is_timeout() {
            HealthCheckError::Timeout(timeout_seconds)
        } else if e.is_builder() {
            HealthCheckError::InvalidUrl(e.to_string())
        } else {
            HealthCheckError::ConnectionFailed(e.to_string())
        }
    }
}
