//! Aggregate gateway counters and the statistics views built from them.

use crate::breaker::CircuitBreakerView;
use crate::queue::LaneDepths;
use crate::registry::{HealthStatus, ServiceEndpoint};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request counters shared by every dispatch path.
#[derive(Debug, Default)]
pub(crate) struct GatewayCounters {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    cached: AtomicU64,
}

impl GatewayCounters {
    pub(crate) fn record_cache_hit(&self, service: &str) {
        self.cached.fetch_add(1, Ordering::Relaxed);
        self.record_outcome(service, true);
        metrics::counter!("analytics_gateway_cache_hits_total", "service" => service.to_string())
            .increment(1);
    }

    pub(crate) fn record_outcome(&self, service: &str, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let status = if success {
            self.successful.fetch_add(1, Ordering::Relaxed);
            "success"
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            "error"
        };
        metrics::counter!("analytics_gateway_requests_total",
            "service" => service.to_string(),
            "status" => status
        )
        .increment(1);
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub(crate) fn successful(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    pub(crate) fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub(crate) fn cached(&self) -> u64 {
        self.cached.load(Ordering::Relaxed)
    }
}

/// Per-instance health and traffic summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealthSummary {
    pub service_id: String,
    pub service_type: String,
    pub health_status: HealthStatus,
    pub request_count: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub average_response_time_ms: f64,
    pub consecutive_failures: u32,
    pub last_health_check: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
}

impl From<&ServiceEndpoint> for ServiceHealthSummary {
    fn from(endpoint: &ServiceEndpoint) -> Self {
        Self {
            service_id: endpoint.service_id.clone(),
            service_type: endpoint.service_type.clone(),
            health_status: endpoint.health_status,
            request_count: endpoint.request_count,
            error_count: endpoint.error_count,
            error_rate: endpoint.error_rate(),
            average_response_time_ms: endpoint.average_response_time_ms,
            consecutive_failures: endpoint.consecutive_failures,
            last_health_check: endpoint.last_health_check,
            uptime_seconds: endpoint.uptime_seconds,
        }
    }
}

/// What a service type offers across its registered instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCapabilities {
    pub service_type: String,
    pub instances: usize,
    pub healthy_instances: usize,
    /// Union of instance capabilities
    pub capabilities: BTreeSet<String>,
    pub versions: BTreeSet<String>,
}

/// Snapshot returned by [`Gateway::get_gateway_stats`].
///
/// [`Gateway::get_gateway_stats`]: super::Gateway::get_gateway_stats
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayStats {
    pub running: bool,
    pub workers: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cached_responses: u64,
    /// Successful share of all counted requests, 0.0 before the first one
    pub success_rate: f64,
    pub circuit_breaker_trips: u64,
    pub open_circuits: Vec<String>,
    pub circuit_breakers: Vec<CircuitBreakerView>,
    pub queue_depths: LaneDepths,
    pub cache_size: usize,
    pub registered_services: usize,
    pub healthy_services: usize,
    pub services: Vec<ServiceHealthSummary>,
}
