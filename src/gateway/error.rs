//! Error types for gateway dispatch.

use thiserror::Error;

/// Fail-fast errors returned by [`Gateway::execute_request`].
///
/// Backend failures (timeouts, transport errors, non-200 answers) are not
/// errors at this level: they come back as error-status responses.
///
/// [`Gateway::execute_request`]: super::Gateway::execute_request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Breaker open or no healthy instance; no network call was made
    #[error("service '{service}' unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    /// Request rejected before dispatch
    #[error("invalid request: {0}")]
    Validation(String),

    /// Queued priorities need running workers
    #[error("gateway is not running")]
    NotRunning,

    /// The gateway stopped while the request was queued
    #[error("gateway shutting down")]
    ShuttingDown,
}

impl GatewayError {
    pub fn circuit_open(service: &str) -> Self {
        GatewayError::ServiceUnavailable {
            service: service.to_string(),
            reason: "circuit breaker open".to_string(),
        }
    }

    pub fn no_healthy_instances(service: &str) -> Self {
        GatewayError::ServiceUnavailable {
            service: service.to_string(),
            reason: "no healthy instances".to_string(),
        }
    }

    /// Stable label for metrics and synthetic batch responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::ServiceUnavailable { .. } => "service_unavailable",
            GatewayError::Validation(_) => "validation",
            GatewayError::NotRunning => "not_running",
            GatewayError::ShuttingDown => "shutting_down",
        }
    }
}

/// Why an outbound call to a selected instance failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchFailure {
    #[error("request timeout after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

impl DispatchFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchFailure::Timeout(_) => "timeout",
            DispatchFailure::Transport(_) => "transport",
            DispatchFailure::HttpStatus { .. } => "http_status",
        }
    }
}
