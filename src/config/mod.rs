//! Configuration module for the analytics gateway
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`GATEWAY_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use analytics_gateway::config::GatewayConfig;
//!
//! let config = GatewayConfig::default();
//! assert_eq!(config.gateway.workers, 4);
//!
//! let toml = r#"
//! [circuit_breaker]
//! failure_threshold = 3
//! "#;
//! let config: GatewayConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.circuit_breaker.failure_threshold, 3);
//! assert_eq!(config.circuit_breaker.recovery_timeout_seconds, 60);
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod registry;

pub use cache::CacheConfig;
pub use circuit_breaker::CircuitBreakerConfig;
pub use error::ConfigError;
pub use gateway::DispatchConfig;
pub use logging::{LogFormat, LoggingConfig, LOG_COMPONENTS};
pub use metrics::MetricsConfig;
pub use registry::RegistryConfig;

// Re-export HealthCheckConfig from health module
pub use crate::health::HealthCheckConfig;

use crate::registry::ServiceRegistration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Unified configuration for the gateway and everything it owns.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Worker pool and dispatch defaults
    pub gateway: DispatchConfig,
    /// Registry and discovery cache settings
    pub registry: RegistryConfig,
    /// Health check loop settings
    pub health_check: HealthCheckConfig,
    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerConfig,
    /// Response cache bounds
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Prometheus exporter
    pub metrics: MetricsConfig,
    /// Services registered at startup
    pub services: Vec<ServiceRegistration>,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports GATEWAY_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(workers) = std::env::var("GATEWAY_WORKERS") {
            if let Ok(w) = workers.parse() {
                self.gateway.workers = w;
            }
        }

        if let Ok(level) = std::env::var("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GATEWAY_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(health) = std::env::var("GATEWAY_HEALTH_CHECK") {
            self.health_check.enabled = health.to_lowercase() == "true";
        }
        if let Ok(cache) = std::env::var("GATEWAY_CACHE") {
            self.cache.enabled = cache.to_lowercase() == "true";
        }
        if let Ok(addr) = std::env::var("GATEWAY_METRICS_ADDR") {
            self.metrics.listen_addr = Some(addr);
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.workers == 0 {
            return Err(ConfigError::Validation {
                field: "gateway.workers".to_string(),
                message: "at least one worker is required".to_string(),
            });
        }
        if self.gateway.default_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "gateway.default_timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Validation {
                field: "circuit_breaker.failure_threshold".to_string(),
                message: "threshold must be at least 1".to_string(),
            });
        }
        if self.health_check.enabled && self.health_check.interval_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "health_check.interval_seconds".to_string(),
                message: "interval must be non-zero".to_string(),
            });
        }

        if let Some(component) = self.logging.unknown_component() {
            return Err(ConfigError::Validation {
                field: format!("logging.component_levels.{}", component),
                message: format!("unknown component (expected one of: {})", LOG_COMPONENTS.join(", ")),
            });
        }

        let mut seen = HashSet::new();
        for (i, service) in self.services.iter().enumerate() {
            if service.service_id.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("services[{}].service_id", i),
                    message: "service_id cannot be empty".to_string(),
                });
            }
            if service.service_type.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("services[{}].service_type", i),
                    message: "service_type cannot be empty".to_string(),
                });
            }
            if service.endpoint_url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("services[{}].endpoint_url", i),
                    message: "URL cannot be empty".to_string(),
                });
            }
            if !seen.insert(service.service_id.as_str()) {
                return Err(ConfigError::Validation {
                    field: format!("services[{}].service_id", i),
                    message: format!("duplicate service_id '{}'", service.service_id),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.gateway.workers, 4);
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.cache.max_size, 1000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout_seconds, 60);
        assert_eq!(config.health_check.interval_seconds, 30);
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_config_parse_full_toml() {
        let toml = include_str!("../../gateway.example.toml");
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].service_type, "analytics_engine");
        assert!(config.services[0].capabilities.contains("pagerank"));
        assert_eq!(
            config.services[1].resolved_health_check_url(),
            "http://localhost:9002/status"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_minimal_service() {
        let toml = r#"
        [[services]]
        service_id = "a"
        service_name = "A"
        service_type = "reports"
        endpoint_url = "http://localhost:7000"
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        let service = &config.services[0];
        assert!(service.capabilities.is_empty());
        assert_eq!(service.version, "1.0.0");
        assert_eq!(
            service.resolved_health_check_url(),
            "http://localhost:7000/health"
        );
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[gateway]\nworkers = 8").unwrap();

        let config = GatewayConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.gateway.workers, 8);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = GatewayConfig::load(Some(Path::new("/nonexistent/gateway.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[gateway\nworkers = ").unwrap();

        let result = GatewayConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_load_none_returns_defaults() {
        let config = GatewayConfig::load(None).unwrap();
        assert_eq!(config.gateway.workers, 4);
    }

    // Env tests mutate process state; keep all of them in one test.
    #[test]
    fn test_config_env_overrides() {
        std::env::set_var("GATEWAY_WORKERS", "12");
        std::env::set_var("GATEWAY_LOG_FORMAT", "json");
        std::env::set_var("GATEWAY_CACHE", "false");
        let config = GatewayConfig::default().with_env_overrides();
        assert_eq!(config.gateway.workers, 12);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.cache.enabled);

        std::env::set_var("GATEWAY_WORKERS", "not-a-number");
        std::env::set_var("GATEWAY_LOG_FORMAT", "xml");
        let config = GatewayConfig::default().with_env_overrides();
        std::env::remove_var("GATEWAY_WORKERS");
        std::env::remove_var("GATEWAY_LOG_FORMAT");
        std::env::remove_var("GATEWAY_CACHE");

        assert_eq!(config.gateway.workers, 4);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_validation_unknown_log_component() {
        let mut config = GatewayConfig::default();
        config
            .logging
            .component_levels
            .insert("routers".to_string(), "debug".to_string());

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. })
                if field == "logging.component_levels.routers"
        ));
    }

    #[test]
    fn test_config_validation_zero_workers() {
        let mut config = GatewayConfig::default();
        config.gateway.workers = 0;

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "gateway.workers"
        ));
    }

    #[test]
    fn test_config_validation_zero_threshold() {
        let mut config = GatewayConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_service_url() {
        let mut config = GatewayConfig::default();
        config
            .services
            .push(ServiceRegistration::new("a", "A", "reports", ""));

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field.contains("endpoint_url")
        ));
    }

    #[test]
    fn test_config_validation_duplicate_service_id() {
        let mut config = GatewayConfig::default();
        config.services.push(ServiceRegistration::new(
            "a",
            "A",
            "reports",
            "http://localhost:1",
        ));
        config.services.push(ServiceRegistration::new(
            "a",
            "A again",
            "reports",
            "http://localhost:2",
        ));

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref message, .. }) if message.contains("duplicate")
        ));
    }
}
