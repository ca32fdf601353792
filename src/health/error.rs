//! Error types for health checking.

use thiserror::Error;

/// Reasons a health probe did not reach the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthCheckError {
    /// Request timeout
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed health check URL
    #[error("invalid health check url: {0}")]
    InvalidUrl(String),
}
