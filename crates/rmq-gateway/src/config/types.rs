//! Configuration types

use std::path::PathBuf;

use serde::Deserialize;

/// Root configuration structure
///
/// Every section is optional; a missing file means all defaults.
///
/// ```yaml
/// server:
///   listen_address: "0.0.0.0"
///   listen_port: 5000
///
/// broker:
///   service_name_patterns: ["rabbitmq", "rmq"]
///   cert_dir: "/tmp"
///   connect_timeout_secs: 30
///   heartbeat_secs: 60
///
/// logging:
///   level: info
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Broker connection configuration
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.listen_address.trim().is_empty() {
            return Err("server.listen_address must not be empty".to_string());
        }
        if self.broker.service_name_patterns.iter().all(|p| p.trim().is_empty()) {
            return Err("broker.service_name_patterns must contain at least one pattern".to_string());
        }
        if self.broker.connect_timeout_secs == 0 {
            return Err("broker.connect_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Port to listen on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
        }
    }
}

/// Broker connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Substrings (case-insensitive) identifying the broker binding by name
    #[serde(default = "default_service_name_patterns")]
    pub service_name_patterns: Vec<String>,

    /// Directory under which per-connection certificate directories are
    /// created. Defaults to the system temporary directory.
    #[serde(default)]
    pub cert_dir: Option<PathBuf>,

    /// Connection setup timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// AMQP heartbeat interval in seconds
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            service_name_patterns: default_service_name_patterns(),
            cert_dir: None,
            connect_timeout_secs: default_connect_timeout(),
            heartbeat_secs: default_heartbeat(),
        }
    }
}

impl BrokerConfig {
    /// Directory certificate files are materialized under
    pub fn cert_dir(&self) -> PathBuf {
        self.cert_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    5000
}

fn default_service_name_patterns() -> Vec<String> {
    vec!["rabbitmq".to_string(), "rmq".to_string()]
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_heartbeat() -> u16 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
