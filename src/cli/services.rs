//! Services command handler

use crate::cli::output::{format_services_json, format_services_table, ServiceView};
use crate::cli::serve::load_config;
use crate::cli::ServicesArgs;
use crate::config::GatewayConfig;
use crate::health::HealthChecker;
use crate::registry::ServiceRegistry;

/// Register the configured services, probe them once and list the result.
pub async fn handle_services(args: &ServicesArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    config.validate()?;
    list_services(args, &config).await
}

async fn list_services(
    args: &ServicesArgs,
    config: &GatewayConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut registry_config = config.registry.clone();
    registry_config.probe_on_register = false;
    let registry = ServiceRegistry::new(
        registry_config,
        HealthChecker::new(config.health_check.clone()),
    );

    for registration in &config.services {
        if args
            .service_type
            .as_ref()
            .is_some_and(|t| *t != registration.service_type)
        {
            continue;
        }
        registry.insert_service(registration.clone());
    }
    registry.check_all_services().await;

    let views: Vec<ServiceView> = registry
        .all_services()
        .iter()
        .map(ServiceView::from)
        .collect();

    if args.json {
        Ok(format_services_json(&views)?)
    } else {
        Ok(format_services_table(&views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceRegistration;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args(json: bool, service_type: Option<&str>) -> ServicesArgs {
        ServicesArgs {
            json,
            service_type: service_type.map(String::from),
            config: PathBuf::from("unused.toml"),
        }
    }

    async fn config_with_live_and_dead_service() -> (MockServer, GatewayConfig) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = GatewayConfig::default();
        config.health_check.timeout_seconds = 2;
        config.services.push(ServiceRegistration::new(
            "engine-live",
            "Live",
            "analytics_engine",
            server.uri(),
        ));
        config.services.push(ServiceRegistration::new(
            "reports-dead",
            "Dead",
            "reports",
            "http://127.0.0.1:1",
        ));
        (server, config)
    }

    #[tokio::test]
    async fn test_services_json_reports_probe_results() {
        let (_server, config) = config_with_live_and_dead_service().await;

        let output = list_services(&args(true, None), &config).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let services = parsed["services"].as_array().unwrap();

        assert_eq!(services.len(), 2);
        assert_eq!(services[0]["service_id"], "engine-live");
        assert_eq!(services[0]["status"], "healthy");
        assert_eq!(services[1]["status"], "unhealthy");
        assert!(services[1]["last_error"].is_string());
    }

    #[tokio::test]
    async fn test_services_type_filter() {
        let (_server, config) = config_with_live_and_dead_service().await;

        let output = list_services(&args(false, Some("reports")), &config)
            .await
            .unwrap();
        assert!(output.contains("reports-dead"));
        assert!(!output.contains("engine-live"));
    }

    #[tokio::test]
    async fn test_services_without_config_file_is_empty() {
        let output = handle_services(&args(true, None)).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(parsed["services"].as_array().unwrap().is_empty());
    }
}
