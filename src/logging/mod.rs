//! Logging helpers
//!
//! Turns the `[logging]` configuration section into `tracing` filter
//! directives. Subscriber installation lives with the command that owns the
//! process (see `cli::serve::init_tracing`).

use crate::config::LoggingConfig;

/// Prefix of every module path in this crate, as seen by `EnvFilter`.
const CRATE_TARGET: &str = "analytics_gateway";

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels configured in the LoggingConfig,
/// in component name order.
///
/// # Examples
///
/// ```
/// use analytics_gateway::config::{LogFormat, LoggingConfig};
/// use analytics_gateway::logging::build_filter_directives;
///
/// let mut config = LoggingConfig {
///     format: LogFormat::Json,
///     ..LoggingConfig::default()
/// };
/// config
///     .component_levels
///     .insert("gateway".to_string(), "debug".to_string());
///
/// let filter_str = build_filter_directives(&config);
/// assert_eq!(filter_str, "info,analytics_gateway::gateway=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    for (component, level) in &config.component_levels {
        filter_str.push_str(&format!(",{}::{}={}", CRATE_TARGET, component, level));
    }

    filter_str
}
