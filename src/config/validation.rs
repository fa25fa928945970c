//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. Every violation is reported, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let throttle = &config.throttle;
    if throttle.ttl_ms == 0 {
        errors.push(ValidationError::new("throttle.ttl_ms", "must be greater than 0"));
    }
    if throttle.limit == 0 {
        errors.push(ValidationError::new("throttle.limit", "must be greater than 0"));
    }
    if throttle.store_timeout_ms == 0 {
        errors.push(ValidationError::new("throttle.store_timeout_ms", "must be greater than 0"));
    }
    if throttle.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "throttle.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    let mut seen = HashSet::new();
    for (i, route) in throttle.routes.iter().enumerate() {
        let field = format!("throttle.routes[{}]", i);
        if !route.path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{}.path", field),
                format!("'{}' must start with '/'", route.path),
            ));
        }
        if !seen.insert(route.path.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.path", field),
                format!("'{}' is configured more than once", route.path),
            ));
        }
        if route.limit == Some(0) {
            errors.push(ValidationError::new(format!("{}.limit", field), "must be greater than 0"));
        }
        if route.ttl_ms == Some(0) {
            errors.push(ValidationError::new(format!("{}.ttl_ms", field), "must be greater than 0"));
        }
    }

    if config.body.max_size == 0 {
        errors.push(ValidationError::new("body.max_size", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
