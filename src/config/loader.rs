//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::security::size::parse_size;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides,
/// then validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    let config = apply_env_overrides(config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Recognised variables: `THROTTLE_TTL` (ms), `THROTTLE_LIMIT`,
/// `MAX_BODY_SIZE` (bytes or "10mb"-style), `BIND_ADDRESS`, `LOG_LEVEL`.
pub fn apply_env_overrides<F>(mut config: GatewayConfig, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("THROTTLE_TTL") {
        config.throttle.ttl_ms = parse_number("THROTTLE_TTL", value)?;
    }
    if let Some(value) = lookup("THROTTLE_LIMIT") {
        config.throttle.limit = parse_number("THROTTLE_LIMIT", value)?;
    }
    if let Some(value) = lookup("MAX_BODY_SIZE") {
        config.body.max_size = parse_size(&value).map_err(|e| ConfigError::Env {
            var: "MAX_BODY_SIZE",
            reason: e.to_string(),
            value,
        })?;
    }
    if let Some(value) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = value;
    }
    if let Some(value) = lookup("LOG_LEVEL") {
        config.observability.log_level = value;
    }
    Ok(config)
}

fn parse_number(var: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Env {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
