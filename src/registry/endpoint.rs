use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Health status of a registered service instance.
///
/// Only `Healthy` instances are eligible for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Last probe returned HTTP 200
    Healthy,
    /// Last probe answered with a non-200 status
    Degraded,
    /// Last probe failed to connect or timed out
    Unhealthy,
    /// Not yet probed
    Unknown,
    /// Taken out of rotation by an operator; skipped by the health loop
    Maintenance,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
            HealthStatus::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "healthy" => Ok(HealthStatus::Healthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            "unknown" => Ok(HealthStatus::Unknown),
            "maintenance" => Ok(HealthStatus::Maintenance),
            _ => Err(format!("Invalid health status: {}", s)),
        }
    }
}

/// Caller-supplied description of a service instance.
///
/// This is both the argument to [`ServiceRegistry::register_service`] and the
/// shape of a `[[services]]` entry in the configuration file.
///
/// # Examples
///
/// ```
/// use analytics_gateway::registry::ServiceRegistration;
///
/// let registration = ServiceRegistration::new(
///     "engine-1",
///     "Graph Engine 1",
///     "analytics_engine",
///     "http://localhost:9001",
/// )
/// .with_capabilities(["pagerank", "centrality"])
/// .with_tags(["primary"]);
///
/// assert_eq!(registration.resolved_health_check_url(), "http://localhost:9001/health");
/// ```
///
/// [`ServiceRegistry::register_service`]: super::ServiceRegistry::register_service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub service_id: String,
    pub service_name: String,
    pub service_type: String,
    pub endpoint_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ServiceRegistration {
    /// Describe a service with no capabilities, tags or metadata.
    pub fn new(
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        service_type: impl Into<String>,
        endpoint_url: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            service_name: service_name.into(),
            service_type: service_type.into(),
            endpoint_url: endpoint_url.into(),
            health_check_url: None,
            capabilities: BTreeSet::new(),
            tags: BTreeSet::new(),
            version: default_version(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = Some(url.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Health check URL, defaulting to `{endpoint_url}/health`.
    pub fn resolved_health_check_url(&self) -> String {
        match &self.health_check_url {
            Some(url) => url.clone(),
            None => format!("{}/health", self.endpoint_url.trim_end_matches('/')),
        }
    }
}

/// A registered backend service instance with its runtime health and traffic state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Unique identifier within the registry
    pub service_id: String,
    /// Human-readable name
    pub service_name: String,
    /// Logical service type requests are addressed to (e.g. "analytics_engine")
    pub service_type: String,
    /// Base URL operations are appended to
    pub endpoint_url: String,
    /// URL probed by the health checker
    pub health_check_url: String,
    pub capabilities: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub version: String,
    pub metadata: HashMap<String, String>,
    /// Current health classification
    pub health_status: HealthStatus,
    /// Failed probes since the last healthy one
    pub consecutive_failures: u32,
    /// Error text of the most recent failed probe
    pub last_error: Option<String>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    /// Running mean of observed response times in milliseconds
    pub average_response_time_ms: f64,
    pub request_count: u64,
    pub error_count: u64,
    /// Seconds since registration, refreshed on every probe
    pub uptime_seconds: u64,
}

impl ServiceEndpoint {
    /// Build a fresh endpoint in `Unknown` status from a registration.
    pub fn from_registration(registration: ServiceRegistration) -> Self {
        let now = Utc::now();
        let health_check_url = registration.resolved_health_check_url();
        Self {
            service_id: registration.service_id,
            service_name: registration.service_name,
            service_type: registration.service_type,
            endpoint_url: registration.endpoint_url,
            health_check_url,
            capabilities: registration.capabilities,
            tags: registration.tags,
            version: registration.version,
            metadata: registration.metadata,
            health_status: HealthStatus::Unknown,
            consecutive_failures: 0,
            last_error: None,
            last_health_check: None,
            registered_at: now,
            last_heartbeat: now,
            average_response_time_ms: 0.0,
            request_count: 0,
            error_count: 0,
            uptime_seconds: 0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health_status == HealthStatus::Healthy
    }

    /// Fraction of requests that failed, 0.0 when nothing was served yet.
    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64
        }
    }

    /// Fold a latency sample into the running mean: `(avg * n + sample) / (n + 1)`.
    pub(crate) fn record_response_time(&mut self, sample_ms: f64) {
        let n = self.request_count as f64;
        self.average_response_time_ms = (self.average_response_time_ms * n + sample_ms) / (n + 1.0);
    }

    pub(crate) fn refresh_uptime(&mut self) {
        let elapsed = Utc::now().signed_duration_since(self.registered_at);
        self.uptime_seconds = elapsed.num_seconds().max(0) as u64;
    }
}
