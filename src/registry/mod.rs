//! Service Registry module.
//!
//! Thread-safe in-memory storage of registered analytics services, filtered
//! discovery with a short-lived result cache, per-instance traffic metrics and
//! the periodic health check loop.

mod discovery;
mod endpoint;
mod error;

pub use discovery::DiscoveryQuery;
pub use endpoint::*;
pub use error::*;

use crate::config::RegistryConfig;
use crate::health::{HealthChecker, ProbeOutcome};
use chrono::Utc;
use dashmap::DashMap;
use discovery::DiscoveryCache;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The Service Registry stores every known backend service instance.
///
/// Uses lock-free concurrent maps (DashMap); no guard is ever held across an
/// `.await`, so probes and dispatches can update instances concurrently.
///
/// # Examples
///
/// ```
/// use analytics_gateway::config::RegistryConfig;
/// use analytics_gateway::health::{HealthCheckConfig, HealthChecker};
/// use analytics_gateway::registry::{HealthStatus, ServiceRegistration, ServiceRegistry};
///
/// let registry = ServiceRegistry::new(
///     RegistryConfig::default(),
///     HealthChecker::new(HealthCheckConfig::default()),
/// );
///
/// registry.insert_service(ServiceRegistration::new(
///     "engine-1",
///     "Engine 1",
///     "analytics_engine",
///     "http://localhost:9001",
/// ));
/// registry.set_health_status("engine-1", HealthStatus::Healthy).unwrap();
///
/// assert_eq!(registry.service_count(), 1);
/// ```
pub struct ServiceRegistry {
    services: DashMap<String, ServiceEndpoint>,
    discovery_cache: DiscoveryCache,
    checker: HealthChecker,
    config: RegistryConfig,
}

impl ServiceRegistry {
    /// Create a new empty registry.
    pub fn new(config: RegistryConfig, checker: HealthChecker) -> Self {
        Self {
            services: DashMap::new(),
            discovery_cache: DiscoveryCache::new(config.discovery_cache_ttl()),
            checker,
            config,
        }
    }

    /// Register a service and probe it once before returning.
    ///
    /// Re-registering an existing `service_id` replaces the previous entry.
    /// The returned endpoint reflects the outcome of the initial probe when
    /// `probe_on_register` is enabled.
    pub async fn register_service(&self, registration: ServiceRegistration) -> ServiceEndpoint {
        let endpoint = self.insert_service(registration);
        if !self.config.probe_on_register {
            return endpoint;
        }

        self.check_service_health(&endpoint.service_id).await;
        self.get_service(&endpoint.service_id).unwrap_or(endpoint)
    }

    /// Insert a service without probing it.
    ///
    /// The new entry starts in `Unknown` status and is invisible to healthy-only
    /// discovery until a probe or [`set_health_status`](Self::set_health_status)
    /// marks it healthy.
    pub fn insert_service(&self, registration: ServiceRegistration) -> ServiceEndpoint {
        let endpoint = ServiceEndpoint::from_registration(registration);
        let id = endpoint.service_id.clone();

        if self.services.insert(id.clone(), endpoint.clone()).is_some() {
            tracing::warn!(service_id = %id, "Service re-registered, previous entry replaced");
        } else {
            tracing::info!(
                service_id = %id,
                service_type = %endpoint.service_type,
                endpoint_url = %endpoint.endpoint_url,
                "Service registered"
            );
        }
        self.discovery_cache.invalidate();

        metrics::gauge!("analytics_gateway_services_total").set(self.services.len() as f64);
        endpoint
    }

    /// Remove a service. Returns false if the id is unknown.
    pub fn unregister_service(&self, service_id: &str) -> bool {
        match self.services.remove(service_id) {
            Some((_, endpoint)) => {
                self.discovery_cache.invalidate();
                metrics::gauge!("analytics_gateway_services_total")
                    .set(self.services.len() as f64);
                tracing::info!(
                    service_id = %service_id,
                    service_type = %endpoint.service_type,
                    "Service unregistered"
                );
                true
            }
            None => {
                tracing::debug!(service_id = %service_id, "Unregister for unknown service");
                false
            }
        }
    }

    /// Record a liveness signal. Health status is left untouched.
    pub fn heartbeat(&self, service_id: &str) -> bool {
        match self.services.get_mut(service_id) {
            Some(mut endpoint) => {
                endpoint.last_heartbeat = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Find services matching a filter, sorted by `service_id`.
    ///
    /// Results are cached per distinct query until the TTL elapses or the
    /// registry membership or any health status changes.
    pub fn discover_services(&self, query: &DiscoveryQuery) -> Vec<ServiceEndpoint> {
        if let Some(cached) = self.discovery_cache.get(query) {
            return cached;
        }

        let generation = self.discovery_cache.generation();
        let mut matches: Vec<ServiceEndpoint> = self
            .services
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| a.service_id.cmp(&b.service_id));

        self.discovery_cache
            .insert(query.clone(), matches.clone(), generation);
        matches
    }

    /// Get a service by ID.
    pub fn get_service(&self, service_id: &str) -> Option<ServiceEndpoint> {
        self.services.get(service_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every registered service, sorted by `service_id`.
    pub fn all_services(&self) -> Vec<ServiceEndpoint> {
        let mut all: Vec<ServiceEndpoint> = self
            .services
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        all
    }

    /// Get the number of registered services.
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub(crate) fn discovery_cache_len(&self) -> usize {
        self.discovery_cache.len()
    }

    /// Record the outcome of one dispatch against a service.
    ///
    /// The latency sample is folded into the running mean before the request
    /// counter advances.
    pub fn update_service_metrics(
        &self,
        service_id: &str,
        response_time_ms: Option<f64>,
        request_delta: u64,
        error_delta: u64,
    ) -> Result<(), RegistryError> {
        let mut endpoint = self
            .services
            .get_mut(service_id)
            .ok_or_else(|| RegistryError::ServiceNotFound(service_id.to_string()))?;

        if let Some(sample) = response_time_ms {
            endpoint.record_response_time(sample);
        }
        endpoint.request_count += request_delta;
        endpoint.error_count += error_delta;
        Ok(())
    }

    /// Force a health status, e.g. to put an instance into maintenance.
    pub fn set_health_status(
        &self,
        service_id: &str,
        status: HealthStatus,
    ) -> Result<(), RegistryError> {
        let mut endpoint = self
            .services
            .get_mut(service_id)
            .ok_or_else(|| RegistryError::ServiceNotFound(service_id.to_string()))?;

        let old_status = endpoint.health_status;
        endpoint.health_status = status;
        if status == HealthStatus::Healthy {
            endpoint.consecutive_failures = 0;
            endpoint.last_error = None;
        }
        drop(endpoint);

        if old_status != status {
            self.discovery_cache.invalidate();
            tracing::info!(
                service_id = %service_id,
                old_status = %old_status,
                new_status = %status,
                "Service status set"
            );
        }
        Ok(())
    }

    /// Probe one service and apply the outcome.
    ///
    /// Returns `None` when the service is unknown or in maintenance.
    pub async fn check_service_health(&self, service_id: &str) -> Option<ProbeOutcome> {
        let endpoint = self.get_service(service_id)?;
        if endpoint.health_status == HealthStatus::Maintenance {
            return None;
        }

        let outcome = self.checker.probe(&endpoint).await;
        self.apply_probe_outcome(service_id, &outcome);
        Some(outcome)
    }

    /// Probe every registered service concurrently.
    ///
    /// Each probe is independent; a failing or slow service only affects its
    /// own entry in the returned list.
    pub async fn check_all_services(&self) -> Vec<(String, ProbeOutcome)> {
        let ids: Vec<String> = self
            .services
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let probes = ids.into_iter().map(|id| async move {
            let outcome = self.check_service_health(&id).await;
            outcome.map(|outcome| (id, outcome))
        });

        futures::future::join_all(probes)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    fn apply_probe_outcome(&self, service_id: &str, outcome: &ProbeOutcome) {
        // The service may have been unregistered while the probe was in flight.
        let Some(mut endpoint) = self.services.get_mut(service_id) else {
            return;
        };

        let old_status = endpoint.health_status;
        let new_status = outcome.status();

        match outcome {
            ProbeOutcome::Healthy { latency_ms } => {
                endpoint.consecutive_failures = 0;
                endpoint.last_error = None;
                endpoint.record_response_time(*latency_ms);
            }
            ProbeOutcome::Degraded { .. } | ProbeOutcome::Unhealthy { .. } => {
                endpoint.consecutive_failures += 1;
                endpoint.last_error = outcome.error_message();
            }
        }
        endpoint.health_status = new_status;
        endpoint.last_health_check = Some(Utc::now());
        endpoint.refresh_uptime();
        let consecutive_failures = endpoint.consecutive_failures;
        drop(endpoint);

        if old_status != new_status {
            self.discovery_cache.invalidate();
            tracing::info!(
                service_id = %service_id,
                old_status = %old_status,
                new_status = %new_status,
                consecutive_failures,
                "Service status changed"
            );
        }
    }

    /// Start the periodic health check loop.
    ///
    /// Returns a JoinHandle that resolves once `cancel_token` fires.
    pub fn start_health_checks(self: &Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let interval_seconds = registry.checker.config().interval_seconds;
            let mut interval = tokio::time::interval(registry.checker.config().interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(interval_seconds, "Health checker started");

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Health checker shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let results = registry.check_all_services().await;
                        let healthy = results
                            .iter()
                            .filter(|(_, outcome)| matches!(outcome, ProbeOutcome::Healthy { .. }))
                            .count();
                        metrics::gauge!("analytics_gateway_services_healthy").set(healthy as f64);
                        tracing::debug!(
                            services_checked = results.len(),
                            healthy,
                            "Health check cycle completed"
                        );
                    }
                }
            }
        })
    }
}
