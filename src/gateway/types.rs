//! Request and response types flowing through the gateway.

use super::GatewayError;
use crate::queue::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// What a caller asks the gateway to do.
///
/// # Examples
///
/// ```
/// use analytics_gateway::gateway::GatewayCall;
/// use analytics_gateway::queue::Priority;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let call = GatewayCall::new("analytics_engine", "pagerank", json!({"graph": "g1"}))
///     .with_priority(Priority::High)
///     .with_timeout(Duration::from_secs(5))
///     .without_cache();
///
/// assert!(!call.use_cache);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayCall {
    /// Service type to route to
    pub service: String,
    /// Operation name, appended to the instance URL
    pub operation: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Outbound timeout; the configured default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

impl GatewayCall {
    pub fn new(service: impl Into<String>, operation: impl Into<String>, payload: Value) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            payload,
            headers: HashMap::new(),
            timeout: None,
            user_id: None,
            priority: Priority::Normal,
            use_cache: true,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Reject malformed calls before any side effect.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.service.trim().is_empty() {
            return Err(GatewayError::Validation("service cannot be empty".to_string()));
        }
        if self.operation.trim().is_empty() {
            return Err(GatewayError::Validation(
                "operation cannot be empty".to_string(),
            ));
        }
        if self.operation.contains("..") || self.operation.starts_with('/') {
            return Err(GatewayError::Validation(format!(
                "operation '{}' is not a relative path",
                self.operation
            )));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(GatewayError::Validation("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// One in-flight call, stamped with its request id.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub request_id: String,
    pub service: String,
    pub operation: String,
    pub payload: Value,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub user_id: Option<String>,
    pub priority: Priority,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl GatewayRequest {
    pub(crate) fn from_call(call: GatewayCall, default_timeout: Duration) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            service: call.service,
            operation: call.operation,
            payload: call.payload,
            headers: call.headers,
            timeout: call.timeout.unwrap_or(default_timeout),
            user_id: call.user_id,
            priority: call.priority,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Outcome classification of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// What the gateway hands back for a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub request_id: String,
    pub service: String,
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    pub execution_time_ms: f64,
    pub status: ResponseStatus,
    pub data: Value,
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayResponse {
    pub fn success(
        request_id: String,
        service: String,
        operation: String,
        data: Value,
        execution_time_ms: f64,
    ) -> Self {
        Self {
            request_id,
            service,
            operation,
            timestamp: Utc::now(),
            execution_time_ms,
            status: ResponseStatus::Success,
            data,
            metadata: Map::new(),
            error: None,
        }
    }

    pub fn error(
        request_id: String,
        service: String,
        operation: String,
        error: String,
        execution_time_ms: f64,
    ) -> Self {
        Self {
            request_id,
            service,
            operation,
            timestamp: Utc::now(),
            execution_time_ms,
            status: ResponseStatus::Error,
            data: Value::Null,
            metadata: Map::new(),
            error: Some(error),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_defaults() {
        let call = GatewayCall::new("analytics_engine", "pagerank", json!({}));
        assert_eq!(call.priority, Priority::Normal);
        assert!(call.use_cache);
        assert!(call.timeout.is_none());
        assert!(call.validate().is_ok());
    }

    #[test]
    fn call_validation_rejects_malformed_requests() {
        let empty_service = GatewayCall::new(" ", "pagerank", json!({}));
        assert!(matches!(
            empty_service.validate(),
            Err(GatewayError::Validation(_))
        ));

        let empty_operation = GatewayCall::new("analytics_engine", "", json!({}));
        assert!(empty_operation.validate().is_err());

        let escaping = GatewayCall::new("analytics_engine", "../admin", json!({}));
        assert!(escaping.validate().is_err());

        let zero_timeout =
            GatewayCall::new("analytics_engine", "pagerank", json!({})).with_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn call_deserializes_with_defaults() {
        let call: GatewayCall = serde_json::from_value(json!({
            "service": "reports",
            "operation": "render",
            "priority": "low"
        }))
        .unwrap();
        assert_eq!(call.priority, Priority::Low);
        assert!(call.use_cache);
        assert_eq!(call.payload, Value::Null);
    }

    #[test]
    fn call_with_unknown_priority_fails_to_deserialize() {
        let result: Result<GatewayCall, _> = serde_json::from_value(json!({
            "service": "reports",
            "operation": "render",
            "priority": "urgent"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn request_inherits_default_timeout() {
        let call = GatewayCall::new("reports", "render", json!({}));
        let request = GatewayRequest::from_call(call, Duration::from_secs(30));
        assert_eq!(request.timeout, Duration::from_secs(30));
        assert_eq!(request.retry_count, 0);
        assert_eq!(request.request_id.len(), 36);
    }

    #[test]
    fn response_status_serializes_lowercase() {
        let response = GatewayResponse::error(
            "r".to_string(),
            "reports".to_string(),
            "render".to_string(),
            "boom".to_string(),
            1.0,
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
    }
}
