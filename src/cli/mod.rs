//! CLI module for the analytics gateway
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `serve` - Run the gateway until SIGINT/SIGTERM
//! - `call` - Send one request through a gateway built from config
//! - `services` - Probe the configured services and list them
//! - `config` - Configuration utilities (init)
//!
//! # Example
//!
//! ```bash
//! # Run with the services from gateway.toml
//! analytics-gateway serve -c gateway.toml
//!
//! # One-off request
//! analytics-gateway call analytics_engine pagerank --payload '{"graph": "g1"}'
//!
//! # Which services are up?
//! analytics-gateway services --type analytics_engine
//! ```

pub mod call;
pub mod config;
pub mod output;
pub mod serve;
pub mod services;

pub use call::handle_call;
pub use config::handle_config_init;
pub use services::handle_services;

use crate::queue::Priority;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Analytics gateway - routes requests to analytics services
#[derive(Parser, Debug)]
#[command(
    name = "analytics-gateway",
    version,
    about = "Request gateway for analytics services"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway
    Serve(ServeArgs),
    /// Send a single request through the gateway
    Call(CallArgs),
    /// List configured services with their health
    Services(ServicesArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,

    /// Override the number of queue workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Disable the periodic health check loop
    #[arg(long)]
    pub no_health_check: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<String>,

    /// Seconds between statistics log lines
    #[arg(long, default_value = "60")]
    pub stats_interval: u64,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Service type to route to
    pub service: String,

    /// Operation to invoke on the selected instance
    pub operation: String,

    /// JSON payload
    #[arg(short, long, default_value = "{}")]
    pub payload: String,

    /// Priority lane (high, normal, low)
    #[arg(long, default_value = "normal")]
    pub priority: Priority,

    /// Request timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Skip the response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Caller identity forwarded as X-User-ID
    #[arg(short, long)]
    pub user: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ServicesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show services of this type
    #[arg(short = 't', long = "type")]
    pub service_type: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "gateway.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}
