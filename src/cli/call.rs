//! Call command handler

use crate::cli::output::format_response_json;
use crate::cli::serve::{load_config, register_configured_services};
use crate::cli::CallArgs;
use crate::gateway::{Gateway, GatewayCall};
use std::time::Duration;

/// Build a [`GatewayCall`] from command-line arguments.
pub fn build_call(args: &CallArgs) -> Result<GatewayCall, Box<dyn std::error::Error>> {
    let payload: serde_json::Value = serde_json::from_str(&args.payload)
        .map_err(|e| format!("--payload is not valid JSON: {}", e))?;

    let mut call = GatewayCall::new(&args.service, &args.operation, payload)
        .with_priority(args.priority);
    if let Some(timeout) = args.timeout {
        call = call.with_timeout(Duration::from_secs(timeout));
    }
    if let Some(ref user) = args.user {
        call = call.with_user(user);
    }
    if args.no_cache {
        call = call.without_cache();
    }
    Ok(call)
}

/// Handle `analytics-gateway call`
///
/// Runs one request through a short-lived gateway and returns the response as
/// pretty JSON. An error-status response is still printed, then reported as a
/// command failure.
pub async fn handle_call(args: &CallArgs) -> Result<String, Box<dyn std::error::Error>> {
    let call = build_call(args)?;

    let mut config = load_config(&args.config)?;
    // One request does not need the periodic loop; registration probes once.
    config.health_check.enabled = false;
    config.validate()?;

    let gateway = Gateway::new(config.clone());
    register_configured_services(&gateway, &config).await;
    gateway.start(1).await;

    let result = gateway.execute_request(call).await;
    gateway.stop().await;

    let response = result?;
    let output = format_response_json(&response)?;
    if !response.is_success() {
        println!("{}", output);
        return Err(response
            .error
            .unwrap_or_else(|| "request failed".to_string())
            .into());
    }
    Ok(output)
}
