//! Output formatting helpers for CLI commands

use crate::gateway::GatewayResponse;
use crate::registry::{HealthStatus, ServiceEndpoint};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for service display
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceView {
    pub service_id: String,
    pub service_type: String,
    pub endpoint_url: String,
    pub version: String,
    pub status: HealthStatus,
    pub capabilities: Vec<String>,
    pub avg_response_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&ServiceEndpoint> for ServiceView {
    fn from(endpoint: &ServiceEndpoint) -> Self {
        Self {
            service_id: endpoint.service_id.clone(),
            service_type: endpoint.service_type.clone(),
            endpoint_url: endpoint.endpoint_url.clone(),
            version: endpoint.version.clone(),
            status: endpoint.health_status,
            capabilities: endpoint.capabilities.iter().cloned().collect(),
            avg_response_ms: endpoint.average_response_time_ms.round() as u64,
            last_error: endpoint.last_error.clone(),
        }
    }
}

fn colored_status(status: HealthStatus) -> String {
    let label = format!("{} {}", status_icon(status), status);
    match status {
        HealthStatus::Healthy => label.green().to_string(),
        HealthStatus::Degraded => label.yellow().to_string(),
        HealthStatus::Unhealthy => label.red().to_string(),
        HealthStatus::Unknown => label.dimmed().to_string(),
        HealthStatus::Maintenance => label.cyan().to_string(),
    }
}

/// Format services as a table
pub fn format_services_table(services: &[ServiceView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Service", "Type", "URL", "Version", "Status", "Capabilities", "Latency",
    ]);

    for s in services {
        table.add_row(vec![
            Cell::new(&s.service_id),
            Cell::new(&s.service_type),
            Cell::new(&s.endpoint_url),
            Cell::new(&s.version),
            Cell::new(colored_status(s.status)),
            Cell::new(s.capabilities.join(", ")),
            Cell::new(format!("{}ms", s.avg_response_ms)),
        ]);
    }

    table.to_string()
}

/// Format services as JSON
pub fn format_services_json(services: &[ServiceView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({
        "services": services
    }))
}

/// Format a gateway response as pretty JSON
pub fn format_response_json(response: &GatewayResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(response)
}

/// Get status icon for a health status
pub fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "✓",
        HealthStatus::Degraded => "!",
        HealthStatus::Unhealthy => "✗",
        HealthStatus::Unknown => "?",
        HealthStatus::Maintenance => "~",
    }
}
