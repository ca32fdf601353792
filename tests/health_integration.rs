//! Integration tests for health monitoring with mock HTTP servers.

mod common;

use analytics_gateway::config::GatewayConfig;
use analytics_gateway::gateway::Gateway;
use analytics_gateway::registry::{DiscoveryQuery, HealthStatus, ServiceRegistration};
use common::*;
use std::time::Duration;
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loop_config() -> GatewayConfig {
    let mut config = test_config();
    config.health_check.enabled = true;
    config.health_check.interval_seconds = 1;
    config.registry.probe_on_register = false;
    config
}

#[tokio::test]
async fn test_health_loop_marks_services() {
    let healthy = healthy_engine().await;
    let degraded = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&degraded)
        .await;

    let gateway = Gateway::new(loop_config());
    gateway.registry().insert_service(engine_registration("engine-1", &healthy));
    gateway.registry().insert_service(engine_registration("engine-2", &degraded));
    gateway.registry().insert_service(ServiceRegistration::new(
        "engine-3",
        "Engine 3",
        ENGINE_TYPE,
        "http://127.0.0.1:1",
    ));

    gateway.start(1).await;
    sleep(Duration::from_millis(500)).await;

    let status = |id: &str| gateway.registry().get_service(id).unwrap().health_status;
    assert_eq!(status("engine-1"), HealthStatus::Healthy);
    assert_eq!(status("engine-2"), HealthStatus::Degraded);
    assert_eq!(status("engine-3"), HealthStatus::Unhealthy);

    let stats = gateway.get_gateway_stats();
    assert_eq!(stats.healthy_services, 1);
    assert_eq!(stats.registered_services, 3);

    gateway.stop().await;
}

#[tokio::test]
async fn test_service_recovers_after_outage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let gateway = Gateway::new(test_config());
    let registry = gateway.registry();
    registry.insert_service(engine_registration("engine-1", &server));

    registry.check_all_services().await;
    registry.check_all_services().await;
    let endpoint = registry.get_service("engine-1").unwrap();
    assert_eq!(endpoint.health_status, HealthStatus::Degraded);
    assert_eq!(endpoint.consecutive_failures, 2);
    assert!(registry
        .discover_services(&DiscoveryQuery::healthy_of_type(ENGINE_TYPE))
        .is_empty());

    registry.check_all_services().await;
    let endpoint = registry.get_service("engine-1").unwrap();
    assert_eq!(endpoint.health_status, HealthStatus::Healthy);
    assert_eq!(endpoint.consecutive_failures, 0);
    assert!(endpoint.last_error.is_none());
    assert_eq!(
        registry
            .discover_services(&DiscoveryQuery::healthy_of_type(ENGINE_TYPE))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_slow_probe_does_not_delay_others() {
    let fast = healthy_engine().await;
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&slow)
        .await;

    let mut config = test_config();
    config.health_check.timeout_seconds = 1;
    let gateway = Gateway::new(config);
    let registry = gateway.registry();
    registry.insert_service(engine_registration("engine-fast", &fast));
    registry.insert_service(engine_registration("engine-slow", &slow));

    let started = std::time::Instant::now();
    let results = registry.check_all_services().await;

    // Probes run concurrently: the cycle is bounded by the probe timeout
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(results.len(), 2);
    assert!(registry.get_service("engine-fast").unwrap().is_healthy());
    assert_eq!(
        registry.get_service("engine-slow").unwrap().health_status,
        HealthStatus::Unhealthy
    );
}

#[tokio::test]
async fn test_maintenance_survives_health_cycles() {
    let server = healthy_engine().await;
    let gateway = Gateway::new(loop_config());
    gateway.registry().insert_service(engine_registration("engine-1", &server));
    gateway
        .registry()
        .set_health_status("engine-1", HealthStatus::Maintenance)
        .unwrap();

    gateway.start(1).await;
    sleep(Duration::from_millis(300)).await;
    gateway.stop().await;

    let endpoint = gateway.registry().get_service("engine-1").unwrap();
    assert_eq!(endpoint.health_status, HealthStatus::Maintenance);
    assert!(endpoint.last_health_check.is_none());
}

#[tokio::test]
async fn test_health_loop_stops_with_gateway() {
    let server = healthy_engine().await;
    let gateway = Gateway::new(loop_config());
    gateway.registry().insert_service(engine_registration("engine-1", &server));

    gateway.start(1).await;
    sleep(Duration::from_millis(200)).await;
    tokio::time::timeout(Duration::from_secs(6), gateway.stop())
        .await
        .expect("stop should complete within the shutdown timeout");

    let probes_at_stop = server.received_requests().await.unwrap().len();
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        probes_at_stop,
        "no probes after stop"
    );
}
