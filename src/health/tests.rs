//! Unit tests for health module.

use super::*;
use crate::registry::ServiceRegistration;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint_for(url: &str) -> ServiceEndpoint {
    ServiceEndpoint::from_registration(ServiceRegistration::new(
        "engine-1",
        "Engine 1",
        "analytics_engine",
        url,
    ))
}

fn checker(timeout_seconds: u64) -> HealthChecker {
    HealthChecker::new(HealthCheckConfig {
        enabled: true,
        interval_seconds: 30,
        timeout_seconds,
    })
}

// ============================================================================
// HealthCheckConfig
// ============================================================================

#[test]
fn test_config_default_values() {
    let config = HealthCheckConfig::default();
    assert!(config.enabled);
    assert_eq!(config.interval_seconds, 30);
    assert_eq!(config.timeout_seconds, 10);
    assert_eq!(config.interval(), Duration::from_secs(30));
    assert_eq!(config.timeout(), Duration::from_secs(10));
}

#[test]
fn test_zero_interval_is_clamped() {
    let config = HealthCheckConfig {
        interval_seconds: 0,
        ..HealthCheckConfig::default()
    };
    assert_eq!(config.interval(), Duration::from_secs(1));
}

#[test]
fn test_config_partial_toml() {
    let toml = r#"
        enabled = false
        interval_seconds = 5
    "#;
    let config: HealthCheckConfig = toml::from_str(toml).unwrap();
    assert!(!config.enabled);
    assert_eq!(config.interval_seconds, 5);
    assert_eq!(config.timeout_seconds, 10); // default
}

// ============================================================================
// HealthCheckError / ProbeOutcome
// ============================================================================

#[test]
fn test_error_display() {
    assert_eq!(
        HealthCheckError::Timeout(10).to_string(),
        "request timeout after 10s"
    );
    assert_eq!(
        HealthCheckError::ConnectionFailed("refused".to_string()).to_string(),
        "connection failed: refused"
    );
}

#[test]
fn test_outcome_maps_to_status() {
    let healthy = ProbeOutcome::Healthy { latency_ms: 3.0 };
    assert_eq!(healthy.status(), HealthStatus::Healthy);
    assert_eq!(healthy.latency_ms(), Some(3.0));
    assert!(healthy.error_message().is_none());

    let degraded = ProbeOutcome::Degraded {
        status_code: 503,
        latency_ms: 4.0,
    };
    assert_eq!(degraded.status(), HealthStatus::Degraded);
    assert_eq!(
        degraded.error_message().as_deref(),
        Some("health check returned HTTP 503")
    );

    let unhealthy = ProbeOutcome::Unhealthy {
        error: HealthCheckError::Timeout(10),
    };
    assert_eq!(unhealthy.status(), HealthStatus::Unhealthy);
    assert!(unhealthy.latency_ms().is_none());
}

// ============================================================================
// Probing
// ============================================================================

#[tokio::test]
async fn test_probe_200_is_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = checker(5).probe(&endpoint_for(&server.uri())).await;
    assert!(matches!(outcome, ProbeOutcome::Healthy { .. }));
}

#[tokio::test]
async fn test_probe_uses_explicit_health_check_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = ServiceEndpoint::from_registration(
        ServiceRegistration::new("engine-2", "Engine 2", "analytics_engine", server.uri())
            .with_health_check_url(format!("{}/status", server.uri())),
    );
    let outcome = checker(5).probe(&endpoint).await;
    assert_eq!(outcome.status(), HealthStatus::Healthy);
}

#[tokio::test]
async fn test_probe_non_200_is_degraded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let outcome = checker(5).probe(&endpoint_for(&server.uri())).await;
    match outcome {
        ProbeOutcome::Degraded { status_code, .. } => assert_eq!(status_code, 503),
        other => panic!("expected degraded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_probe_connection_refused_is_unhealthy() {
    // Port 1 is never listening in the test environment
    let outcome = checker(2).probe(&endpoint_for("http://127.0.0.1:1")).await;
    assert!(matches!(
        outcome,
        ProbeOutcome::Unhealthy {
            error: HealthCheckError::ConnectionFailed(_)
        }
    ));
}

#[tokio::test]
async fn test_probe_timeout_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let outcome = checker(1).probe(&endpoint_for(&server.uri())).await;
    assert_eq!(
        outcome,
        ProbeOutcome::Unhealthy {
            error: HealthCheckError::Timeout(1)
        }
    );
}

#[tokio::test]
async fn test_probe_invalid_url_is_unhealthy() {
    let outcome = checker(1).probe(&endpoint_for("not a url")).await;
    assert_eq!(outcome.status(), HealthStatus::Unhealthy);
}
