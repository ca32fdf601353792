//! # Gateway
//!
//! The request gateway in front of the analytics services.
//!
//! A call flows through validation, the response cache, the per-service
//! circuit breaker and then either runs inline (high priority) or waits in a
//! priority lane for a worker. The dispatch body discovers healthy instances,
//! picks one round-robin and POSTs the payload to `{endpoint_url}/{operation}`.
//!
//! ## Example
//!
//! ```no_run
//! use analytics_gateway::config::GatewayConfig;
//! use analytics_gateway::gateway::{Gateway, GatewayCall};
//! use analytics_gateway::registry::ServiceRegistration;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Gateway::new(GatewayConfig::default());
//! gateway
//!     .register_service(ServiceRegistration::new(
//!         "engine-1",
//!         "Engine 1",
//!         "analytics_engine",
//!         "http://localhost:9001",
//!     ))
//!     .await;
//! gateway.start(4).await;
//!
//! let call = GatewayCall::new("analytics_engine", "pagerank", json!({"graph": "g1"}));
//! let response = gateway.execute_request(call).await?;
//! println!("{}", response.data);
//!
//! gateway.stop().await;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod error;
mod stats;
mod types;
mod worker;

pub use error::*;
pub use stats::{GatewayStats, ServiceCapabilities, ServiceHealthSummary};
pub use types::*;

use crate::breaker::CircuitBreakerTable;
use crate::cache::{cache_key, ResponseCache};
use crate::config::GatewayConfig;
use crate::health::HealthChecker;
use crate::queue::{DispatchQueues, Priority, QueuedDispatch};
use crate::registry::{ServiceEndpoint, ServiceRegistration, ServiceRegistry};
use crate::routing::LoadBalancer;
use chrono::Utc;
use serde_json::Value;
use stats::GatewayCounters;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// State shared by the caller-facing [`Gateway`], the workers and the
/// dispatch body.
pub(crate) struct GatewayCore {
    pub(crate) registry: Arc<ServiceRegistry>,
    pub(crate) breakers: CircuitBreakerTable,
    pub(crate) cache: ResponseCache,
    pub(crate) balancer: LoadBalancer,
    pub(crate) queues: DispatchQueues,
    pub(crate) counters: GatewayCounters,
    pub(crate) client: reqwest::Client,
    pub(crate) config: GatewayConfig,
}

/// Background tasks owned while the gateway is running.
struct RunningTasks {
    cancel_token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    health: Option<JoinHandle<()>>,
}

/// The caller-facing gateway.
///
/// Construct once, [`start`](Self::start) it, share it behind an `Arc` and
/// [`stop`](Self::stop) it on shutdown.
pub struct Gateway {
    core: Arc<GatewayCore>,
    tasks: Mutex<Option<RunningTasks>>,
    running: AtomicBool,
    workers: AtomicUsize,
}

impl Gateway {
    /// Build a gateway with its own registry.
    pub fn new(config: GatewayConfig) -> Self {
        let checker = HealthChecker::new(config.health_check.clone());
        let registry = Arc::new(ServiceRegistry::new(config.registry.clone(), checker));
        Self::with_registry(config, registry)
    }

    /// Build a gateway on top of an existing registry.
    pub fn with_registry(config: GatewayConfig, registry: Arc<ServiceRegistry>) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        let core = GatewayCore {
            registry,
            breakers: CircuitBreakerTable::new(config.circuit_breaker.clone()),
            cache: ResponseCache::new(config.cache.clone()),
            balancer: LoadBalancer::new(),
            queues: DispatchQueues::new(),
            counters: GatewayCounters::default(),
            client,
            config,
        };

        Self {
            core: Arc::new(core),
            tasks: Mutex::new(None),
            running: AtomicBool::new(false),
            workers: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.core.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.core.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register a service, probing it once when configured to.
    pub async fn register_service(&self, registration: ServiceRegistration) -> ServiceEndpoint {
        self.core.registry.register_service(registration).await
    }

    pub fn unregister_service(&self, service_id: &str) -> bool {
        self.core.registry.unregister_service(service_id)
    }

    /// Spawn `num_workers` queue workers and, when enabled, the health loop.
    ///
    /// Zero workers falls back to the configured count, and at least one
    /// worker always runs. Calling `start` on a running gateway only logs a
    /// warning.
    pub async fn start(&self, num_workers: usize) {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            tracing::warn!("Gateway already running, start ignored");
            return;
        }

        let num_workers = match (num_workers, self.core.config.gateway.workers) {
            (0, 0) => {
                tracing::warn!("No worker count configured, starting a single worker");
                1
            }
            (0, configured) => configured,
            (requested, _) => requested,
        };

        let cancel_token = CancellationToken::new();
        let workers = (0..num_workers)
            .map(|id| {
                tokio::spawn(worker::run_worker(
                    id,
                    Arc::clone(&self.core),
                    cancel_token.clone(),
                ))
            })
            .collect();

        let health = if self.core.config.health_check.enabled {
            Some(self.core.registry.start_health_checks(cancel_token.clone()))
        } else {
            None
        };

        *tasks = Some(RunningTasks {
            cancel_token,
            workers,
            health,
        });
        self.workers.store(num_workers, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(
            workers = num_workers,
            health_checks = self.core.config.health_check.enabled,
            "Gateway started"
        );
    }

    /// Cancel background tasks, wait for them and fail whatever is still queued.
    pub async fn stop(&self) {
        let Some(running) = self.tasks.lock().await.take() else {
            tracing::debug!("Gateway not running, stop ignored");
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        running.cancel_token.cancel();

        let mut handles = running.workers;
        handles.extend(running.health);
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let timeout = self.core.config.gateway.shutdown_timeout();
        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_seconds = timeout.as_secs(),
                "Background tasks did not stop in time, aborting"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        let drained = self.core.queues.drain().await;
        self.workers.store(0, Ordering::SeqCst);
        tracing::info!(drained, "Gateway stopped");
    }

    /// Execute one call.
    ///
    /// Typed errors are reserved for fail-fast conditions: validation, an
    /// open breaker, no healthy instance, and lifecycle. Backend failures come
    /// back as error-status responses.
    pub async fn execute_request(&self, call: GatewayCall) -> Result<GatewayResponse, GatewayError> {
        call.validate()?;

        let started = Instant::now();
        let key = if call.use_cache {
            cache_key(&call.service, &call.operation, &call.payload)
        } else {
            None
        };
        let request = GatewayRequest::from_call(call, self.core.config.gateway.default_timeout());

        if let Some(key) = &key {
            if let Some(cached) = self.core.cache.get(key) {
                self.core.counters.record_cache_hit(&request.service);
                tracing::debug!(
                    request_id = %request.request_id,
                    service = %request.service,
                    operation = %request.operation,
                    "Cache hit"
                );
                return Ok(restamp(cached, &request, started));
            }
        }

        if self.core.breakers.is_open(&request.service) {
            self.core.counters.record_outcome(&request.service, false);
            tracing::warn!(
                request_id = %request.request_id,
                service = %request.service,
                "Circuit breaker open, failing fast"
            );
            return Err(GatewayError::circuit_open(&request.service));
        }

        let service = request.service.clone();
        let outcome = if request.priority == Priority::High {
            self.core.dispatch(request).await
        } else {
            self.enqueue_and_wait(request).await
        };

        let success = matches!(&outcome, Ok(response) if response.is_success());
        self.core.counters.record_outcome(&service, success);

        if let (Some(key), Ok(response)) = (key, &outcome) {
            if response.is_success() {
                self.core.cache.put(key, response.clone());
            }
        }
        outcome
    }

    async fn enqueue_and_wait(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        if !self.is_running() {
            return Err(GatewayError::NotRunning);
        }

        let (item, response_rx) = QueuedDispatch::new(request);
        self.core.queues.enqueue(item);

        // A concurrent stop may have drained the lanes just before the enqueue.
        if !self.is_running() {
            self.core.queues.drain().await;
        }

        response_rx.await.unwrap_or(Err(GatewayError::ShuttingDown))
    }

    /// Execute many calls concurrently.
    ///
    /// Always returns one response per call, in input order. Typed errors are
    /// converted to error-status responses carrying `metadata.error_kind`.
    pub async fn execute_batch_requests(&self, calls: Vec<GatewayCall>) -> Vec<GatewayResponse> {
        let batch_size = calls.len();
        let futures = calls.into_iter().map(|call| async move {
            let service = call.service.clone();
            let operation = call.operation.clone();
            match self.execute_request(call).await {
                Ok(response) => response,
                Err(e) => GatewayResponse::error(
                    uuid::Uuid::new_v4().to_string(),
                    service,
                    operation,
                    e.to_string(),
                    0.0,
                )
                .with_metadata("error_kind", e.kind()),
            }
        });

        let responses = futures::future::join_all(futures).await;
        tracing::debug!(
            batch_size,
            failed = responses.iter().filter(|r| !r.is_success()).count(),
            "Batch completed"
        );
        responses
    }

    /// What each service type offers, optionally restricted to one type.
    pub fn get_service_capabilities(
        &self,
        service_type: Option<&str>,
    ) -> BTreeMap<String, ServiceCapabilities> {
        let mut by_type: BTreeMap<String, ServiceCapabilities> = BTreeMap::new();

        for endpoint in self.core.registry.all_services() {
            if service_type.is_some_and(|t| t != endpoint.service_type) {
                continue;
            }
            let entry = by_type
                .entry(endpoint.service_type.clone())
                .or_insert_with(|| ServiceCapabilities {
                    service_type: endpoint.service_type.clone(),
                    instances: 0,
                    healthy_instances: 0,
                    capabilities: Default::default(),
                    versions: Default::default(),
                });
            entry.instances += 1;
            if endpoint.is_healthy() {
                entry.healthy_instances += 1;
            }
            entry.capabilities.extend(endpoint.capabilities.iter().cloned());
            entry.versions.insert(endpoint.version.clone());
        }

        by_type
    }

    /// Snapshot of counters, breakers, lanes, cache and registry health.
    pub fn get_gateway_stats(&self) -> GatewayStats {
        let counters = &self.core.counters;
        let total = counters.total();
        let successful = counters.successful();
        let services = self.core.registry.all_services();

        GatewayStats {
            running: self.is_running(),
            workers: self.workers.load(Ordering::SeqCst),
            total_requests: total,
            successful_requests: successful,
            failed_requests: counters.failed(),
            cached_responses: counters.cached(),
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            circuit_breaker_trips: self.core.breakers.trip_count(),
            open_circuits: self.core.breakers.open_circuits(),
            circuit_breakers: self.core.breakers.views(),
            queue_depths: self.core.queues.depths(),
            cache_size: self.core.cache.len(),
            registered_services: services.len(),
            healthy_services: services.iter().filter(|s| s.is_healthy()).count(),
            services: services.iter().map(ServiceHealthSummary::from).collect(),
        }
    }

    /// Reset one service's breaker, e.g. after an operator fixed the backend.
    pub fn reset_circuit_breaker(&self, service: &str) {
        self.core.breakers.reset(service);
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.core.cache.clear();
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        if let Some(running) = self.tasks.get_mut().take() {
            running.cancel_token.cancel();
        }
    }
}

/// Return a cached response as if it had just been produced for `request`.
fn restamp(mut cached: GatewayResponse, request: &GatewayRequest, started: Instant) -> GatewayResponse {
    cached.request_id = request.request_id.clone();
    cached.timestamp = Utc::now();
    cached.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    cached.metadata.insert("cache_hit".to_string(), Value::Bool(true));
    cached
}
