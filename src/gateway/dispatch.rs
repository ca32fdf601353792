//! The dispatch body shared by inline and queued execution.

use super::{DispatchFailure, GatewayCore, GatewayError, GatewayRequest, GatewayResponse};
use crate::queue::DispatchResult;
use crate::registry::{DiscoveryQuery, ServiceEndpoint};
use serde_json::Value;
use std::time::Instant;

/// Longest backend error body kept in an error response.
const MAX_ERROR_BODY: usize = 512;

/// Records the completion of one outbound call on every exit path.
///
/// Dropping the guard without calling `succeed` or `fail` means the dispatch
/// future was cancelled mid-call: the attempt is counted against the instance
/// but not against its circuit breaker.
struct InFlight<'a> {
    core: &'a GatewayCore,
    service: &'a str,
    service_id: &'a str,
    started: Instant,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn new(core: &'a GatewayCore, service: &'a str, service_id: &'a str) -> Self {
        Self {
            core,
            service,
            service_id,
            started: Instant::now(),
            finished: false,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn succeed(mut self) -> f64 {
        self.finished = true;
        let elapsed_ms = self.elapsed_ms();
        self.core.breakers.record_success(self.service);
        self.update_registry(Some(elapsed_ms), 0);
        self.record_duration(elapsed_ms, "success");
        elapsed_ms
    }

    fn fail(mut self, failure: &DispatchFailure) -> f64 {
        self.finished = true;
        let elapsed_ms = self.elapsed_ms();
        self.core.breakers.record_failure(self.service);
        self.update_registry(None, 1);
        self.record_duration(elapsed_ms, failure.kind());
        elapsed_ms
    }

    fn update_registry(&self, response_time_ms: Option<f64>, errors: u64) {
        // The instance may have been unregistered while the call was in flight.
        if let Err(e) = self
            .core
            .registry
            .update_service_metrics(self.service_id, response_time_ms, 1, errors)
        {
            tracing::debug!(error = %e, "Skipped metrics update");
        }
    }

    fn record_duration(&self, elapsed_ms: f64, outcome: &'static str) {
        metrics::histogram!("analytics_gateway_dispatch_duration_seconds",
            "service" => self.service.to_string(),
            "outcome" => outcome
        )
        .record(elapsed_ms / 1000.0);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!(
            service = %self.service,
            service_id = %self.service_id,
            elapsed_ms = self.elapsed_ms(),
            "Dispatch cancelled before completion"
        );
        self.update_registry(None, 1);
    }
}

impl GatewayCore {
    /// Route a request to a healthy instance and call it.
    ///
    /// Only "no healthy instance" is an error; every backend failure becomes
    /// an error-status response.
    pub(crate) async fn dispatch(&self, request: GatewayRequest) -> DispatchResult {
        let candidates = self
            .registry
            .discover_services(&DiscoveryQuery::healthy_of_type(&request.service));

        let Some(endpoint) = self.balancer.select(&request.service, &candidates) else {
            tracing::warn!(
                request_id = %request.request_id,
                service = %request.service,
                "No healthy instances available"
            );
            return Err(GatewayError::no_healthy_instances(&request.service));
        };

        tracing::debug!(
            request_id = %request.request_id,
            service = %request.service,
            operation = %request.operation,
            service_id = %endpoint.service_id,
            priority = %request.priority,
            "Dispatching request"
        );
        if let Some(payload) = self.config.logging.payload_preview(&request.payload) {
            tracing::debug!(request_id = %request.request_id, %payload, "Request payload");
        }

        let in_flight = InFlight::new(self, &request.service, &endpoint.service_id);
        let outcome = self.call_endpoint(&request, endpoint).await;

        let response = match outcome {
            Ok(data) => {
                let elapsed_ms = in_flight.succeed();
                GatewayResponse::success(
                    request.request_id.clone(),
                    request.service.clone(),
                    request.operation.clone(),
                    data,
                    elapsed_ms,
                )
            }
            Err(failure) => {
                let elapsed_ms = in_flight.fail(&failure);
                tracing::warn!(
                    request_id = %request.request_id,
                    service = %request.service,
                    service_id = %endpoint.service_id,
                    error = %failure,
                    "Dispatch failed"
                );
                GatewayResponse::error(
                    request.request_id.clone(),
                    request.service.clone(),
                    request.operation.clone(),
                    failure.to_string(),
                    elapsed_ms,
                )
                .with_metadata("error_kind", failure.kind())
            }
        };

        Ok(response
            .with_metadata("service_id", endpoint.service_id.clone())
            .with_metadata("endpoint_url", endpoint.endpoint_url.clone())
            .with_metadata("priority", request.priority.to_string()))
    }

    /// POST the payload to `{endpoint_url}/{operation}`.
    async fn call_endpoint(
        &self,
        request: &GatewayRequest,
        endpoint: &ServiceEndpoint,
    ) -> Result<Value, DispatchFailure> {
        let url = format!(
            "{}/{}",
            endpoint.endpoint_url.trim_end_matches('/'),
            request.operation
        );
        let timeout_ms = request.timeout.as_millis() as u64;

        let mut builder = self
            .client
            .post(&url)
            .timeout(request.timeout)
            .header("x-request-id", request.request_id.as_str())
            .json(&request.payload);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(user_id) = &request.user_id {
            builder = builder.header("x-user-id", user_id.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(e, timeout_ms))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(e, timeout_ms))?;

        if status != 200 {
            return Err(DispatchFailure::HttpStatus {
                status,
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Classify reqwest error into DispatchFailure.
fn classify_error(e: reqwest::Error, timeout_ms: u64) -> DispatchFailure {
    if e.is_timeout() {
        DispatchFailure::Timeout(timeout_ms)
    } else {
        DispatchFailure::Transport(e.to_string())
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
