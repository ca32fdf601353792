//! Serve command implementation

use crate::cli::ServeArgs;
use crate::config::{GatewayConfig, LogFormat};
use crate::gateway::Gateway;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration from `path`, falling back to defaults when the file is
/// missing, then apply `GATEWAY_*` environment overrides.
pub fn load_config(path: &Path) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let config = if path.exists() {
        GatewayConfig::load(Some(path))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        GatewayConfig::default()
    };

    Ok(config.with_env_overrides())
}

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;

    // CLI overrides (highest priority)
    if let Some(workers) = args.workers {
        config.gateway.workers = workers;
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_health_check {
        config.health_check.enabled = false;
    }
    if let Some(ref addr) = args.metrics_addr {
        config.metrics.listen_addr = Some(addr.clone());
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.log_payloads {
        eprintln!("WARNING: Payload logging is enabled. Request payloads will be logged at debug level.");
        eprintln!("         This may include sensitive data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Register every `[[services]]` entry with the gateway.
///
/// Registration probes each service once (when `probe_on_register` is set),
/// so the gateway starts with a current view of service health.
pub async fn register_configured_services(gateway: &Gateway, config: &GatewayConfig) {
    for registration in &config.services {
        let endpoint = gateway.register_service(registration.clone()).await;
        tracing::info!(
            service_id = %endpoint.service_id,
            service_type = %endpoint.service_type,
            endpoint_url = %endpoint.endpoint_url,
            status = %endpoint.health_status,
            "Loaded service from config"
        );
    }
}

/// Install the Prometheus exporter with its own scrape listener.
pub fn install_metrics_exporter(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| format!("invalid metrics listen address '{}': {}", addr, e))?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(addr = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Log a statistics summary every `interval` until cancelled.
async fn log_stats_periodically(
    gateway: Arc<Gateway>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let stats = gateway.get_gateway_stats();
                tracing::info!(
                    total_requests = stats.total_requests,
                    successful_requests = stats.successful_requests,
                    failed_requests = stats.failed_requests,
                    cached_responses = stats.cached_responses,
                    success_rate = stats.success_rate,
                    open_circuits = stats.open_circuits.len(),
                    queued = stats.queue_depths.total(),
                    healthy_services = stats.healthy_services,
                    registered_services = stats.registered_services,
                    "Gateway statistics"
                );
            }
        }
    }
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;

    tracing::info!("Starting analytics gateway");
    tracing::debug!(?config, "Loaded configuration");

    // 3. Metrics exporter (optional)
    if let Some(ref addr) = config.metrics.listen_addr {
        install_metrics_exporter(addr)?;
    }

    // 4. Build the gateway and register static services
    let gateway = Arc::new(Gateway::new(config.clone()));
    register_configured_services(&gateway, &config).await;

    // 5. Start workers and the health loop
    gateway.start(config.gateway.workers).await;

    let cancel_token = CancellationToken::new();
    let stats_handle = tokio::spawn(log_stats_periodically(
        Arc::clone(&gateway),
        Duration::from_secs(args.stats_interval.max(1)),
        cancel_token.clone(),
    ));

    // 6. Run until signalled
    shutdown_signal(cancel_token.clone()).await;

    // 7. Cleanup
    gateway.stop().await;
    stats_handle.await?;

    tracing::info!("Analytics gateway stopped");
    Ok(())
}
