//! `[logging]` section: output format, per-component levels and payload logging.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Modules that accept a level under `[logging.component_levels]`.
pub const LOG_COMPONENTS: &[&str] = &[
    "breaker", "cache", "cli", "gateway", "health", "queue", "registry", "routing",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LogFormat::Pretty, LogFormat::Json]
            .into_iter()
            .find(|format| s.eq_ignore_ascii_case(&format.to_string()))
            .ok_or_else(|| format!("unknown log format '{}' (expected pretty or json)", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level for every target
    pub level: String,
    pub format: LogFormat,
    /// Level overrides keyed by component, e.g. `breaker = "debug"`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub component_levels: BTreeMap<String, String>,
    /// Log dispatched payloads at debug level. Payloads may carry user data.
    pub log_payloads: bool,
    /// Serialized payloads longer than this are cut in the log line
    pub payload_preview_bytes: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: BTreeMap::new(),
            log_payloads: false,
            payload_preview_bytes: 1024,
        }
    }
}

impl LoggingConfig {
    /// First configured component that is not a gateway module.
    pub fn unknown_component(&self) -> Option<&str> {
        self.component_levels
            .keys()
            .map(String::as_str)
            .find(|component| !LOG_COMPONENTS.contains(component))
    }

    /// Payload text for the debug log, or `None` when payload logging is off.
    pub fn payload_preview(&self, payload: &serde_json::Value) -> Option<String> {
        if !self.log_payloads {
            return None;
        }
        let mut text = payload.to_string();
        if text.len() > self.payload_preview_bytes {
            let mut cut = self.payload_preview_bytes;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            let total = text.len();
            text.truncate(cut);
            text.push_str(&format!("... ({} bytes)", total));
        }
        Some(text)
    }
}
