//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section falls back to its defaults, so an empty file is valid.

use serde::{Deserialize, Serialize};

use crate::handler::HandlerOptions;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request handling behaviour.
    pub handler: HandlerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Handler configuration, mirrored by `HandlerOptions`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HandlerConfig {
    /// Reject bodies with an unrecognized content type (415).
    pub strict_content_type: bool,

    /// Answer 405 instead of 404 on method mismatch.
    pub method_not_allowed: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        let options = HandlerOptions::default();
        Self {
            strict_content_type: options.strict_content_type,
            method_not_allowed: options.method_not_allowed,
            max_body_size: options.max_body_size,
        }
    }
}

impl From<&HandlerConfig> for HandlerOptions {
    fn from(config: &HandlerConfig) -> Self {
        Self {
            strict_content_type: config.strict_content_type,
            method_not_allowed: config.method_not_allowed,
            max_body_size: config.max_body_size,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output style.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output style.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.handler.max_body_size, 2 * 1024 * 1024);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [handler]
            method_not_allowed = true

            [observability]
            log_format = "compact"
            "#,
        )
        .unwrap();
        assert!(config.handler.method_not_allowed);
        assert!(!config.handler.strict_content_type);
        assert_eq!(config.observability.log_format, LogFormat::Compact);
        assert_eq!(config.observability.log_level, "info");

        let options = HandlerOptions::from(&config.handler);
        assert!(options.method_not_allowed);
        assert_eq!(options.max_body_size, 2 * 1024 * 1024);
    }
}
