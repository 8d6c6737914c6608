//! Configuration loader

use std::path::Path;

use super::env::{EnvSource, ProcessEnv};
use super::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Load configuration from an optional YAML file
///
/// Without a file every value takes its default. Environment overrides
/// are applied in both cases.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            parse_config(&contents, &ProcessEnv)
        }
        None => finish(GatewayConfig::default(), &ProcessEnv),
    }
}

/// Parse YAML and resolve it against `env`
pub fn parse_config(yaml: &str, env: &dyn EnvSource) -> Result<GatewayConfig> {
    let config: GatewayConfig = if yaml.trim().is_empty() {
        GatewayConfig::default()
    } else {
        serde_yaml::from_str(yaml)?
    };
    finish(config, env)
}

fn finish(mut config: GatewayConfig, env: &dyn EnvSource) -> Result<GatewayConfig> {
    resolve_config_env_vars(&mut config, env);
    apply_env_overrides(&mut config, env);
    config.validate().map_err(GatewayError::Config)?;
    Ok(config)
}

/// Apply environment variable overrides to a config.
///
/// Supported env vars:
/// - `PORT` - Listen port assigned by the platform
/// - `RMQ_GATEWAY_LISTEN_ADDRESS` - Override listen address
/// - `RMQ_GATEWAY_LOG_LEVEL` - Override log level
/// - `RMQ_GATEWAY_CERT_DIR` - Override the certificate scratch directory
pub fn apply_env_overrides(config: &mut GatewayConfig, env: &dyn EnvSource) {
    if let Some(val) = env.var("PORT") {
        match val.parse::<u16>() {
            Ok(port) => {
                debug!("Overriding listen_port from PORT");
                config.server.listen_port = port;
            }
            Err(_) => warn!(value = %val, "Ignoring PORT, not a valid port number"),
        }
    }
    if let Some(val) = env.var("RMQ_GATEWAY_LISTEN_ADDRESS") {
        debug!("Overriding listen_address from RMQ_GATEWAY_LISTEN_ADDRESS");
        config.server.listen_address = val;
    }
    if let Some(val) = env.var("RMQ_GATEWAY_LOG_LEVEL") {
        debug!("Overriding log level from RMQ_GATEWAY_LOG_LEVEL");
        config.logging.level = val;
    }
    if let Some(val) = env.var("RMQ_GATEWAY_CERT_DIR") {
        debug!("Overriding cert_dir from RMQ_GATEWAY_CERT_DIR");
        config.broker.cert_dir = Some(val.into());
    }
}

/// Resolve environment variables in a string value
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - curly brace syntax
/// - `$VAR_NAME` - simple syntax (whole value must be the reference)
///
/// If the environment variable is not set, the original value is preserved.
fn resolve_env_var(value: &str, env: &dyn EnvSource) -> String {
    let var_name = if let Some(inner) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        inner
    } else if let Some(inner) = value.strip_prefix('$').filter(|v| !v.is_empty() && !v.contains(' ')) {
        inner
    } else {
        return value.to_string();
    };

    match env.var(var_name) {
        Some(env_value) => {
            debug!("Resolved env var {} from config", var_name);
            env_value
        }
        None => {
            debug!("Env var {} not set, keeping original value", var_name);
            value.to_string()
        }
    }
}

/// Resolve environment variables in all config fields that support it
fn resolve_config_env_vars(config: &mut GatewayConfig, env: &dyn EnvSource) {
    config.server.listen_address = resolve_env_var(&config.server.listen_address, env);
    config.logging.level = resolve_env_var(&config.logging.level, env);
    for pattern in &mut config.broker.service_name_patterns {
        *pattern = resolve_env_var(pattern, env);
    }
    if let Some(dir) = config.broker.cert_dir.as_ref().and_then(|d| d.to_str()) {
        config.broker.cert_dir = Some(resolve_env_var(dir, env).into());
    }
}
