//! Shared test utilities for gateway integration tests.
//!
//! Provides mock analytics services and gateway builders to reduce
//! duplication across test files.

#![allow(dead_code)]

use analytics_gateway::config::GatewayConfig;
use analytics_gateway::gateway::Gateway;
use analytics_gateway::registry::ServiceRegistration;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Service type used by the mock analytics engines.
pub const ENGINE_TYPE: &str = "analytics_engine";

/// Config with the background loop off and fast queue polling.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.health_check.enabled = false;
    config.health_check.timeout_seconds = 2;
    config.gateway.queue_poll_interval_ms = 10;
    config.gateway.default_timeout_seconds = 5;
    config
}

/// Start a mock engine that answers its health check with 200.
pub async fn healthy_engine() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

/// Mount a POST handler for `operation` answering `status` with a JSON body.
pub async fn mount_operation(server: &MockServer, operation: &str, status: u16, expected: Option<u64>) {
    let mock = Mock::given(method("POST"))
        .and(path(format!("/{}", operation)))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "operation": operation,
            "served_by": server.uri(),
        })));
    match expected {
        Some(n) => mock.expect(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

pub fn engine_registration(id: &str, server: &MockServer) -> ServiceRegistration {
    ServiceRegistration::new(id, format!("Engine {}", id), ENGINE_TYPE, server.uri())
        .with_capabilities(["pagerank"])
}

/// Build a gateway, register one engine per server (probing each) and start it.
pub async fn started_gateway(config: GatewayConfig, servers: &[&MockServer]) -> Gateway {
    let gateway = Gateway::new(config);
    for (i, server) in servers.iter().enumerate() {
        gateway
            .register_service(engine_registration(&format!("engine-{}", i + 1), server))
            .await;
    }
    gateway.start(2).await;
    gateway
}
