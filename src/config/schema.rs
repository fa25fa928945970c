//! Configuration schema definitions.
//!
//! All sections default independently, so a config file only needs to
//! name the values it changes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::security::size::{parse_size, DEFAULT_MAX_BODY_BYTES};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-client request throttling.
    pub throttle: ThrottleConfig,

    /// Request body limits.
    pub body: BodyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
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

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds (`THROTTLE_TTL`).
    pub ttl_ms: u64,

    /// Maximum requests per window and client (`THROTTLE_LIMIT`).
    pub limit: u64,

    /// Use the first `X-Forwarded-For` entry as the client address.
    pub trust_forwarded_for: bool,

    /// Deadline for a single counter store round trip.
    pub store_timeout_ms: u64,

    /// How often expired counters are swept out of the store.
    pub sweep_interval_secs: u64,

    /// Per-route overrides, keyed by route template.
    pub routes: Vec<RouteThrottleConfig>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 60_000,
            limit: 10,
            trust_forwarded_for: false,
            store_timeout_ms: 50,
            sweep_interval_secs: 60,
            routes: vec![RouteThrottleConfig {
                path: "/health".to_string(),
                skip: true,
                limit: None,
                ttl_ms: None,
            }],
        }
    }
}

/// Throttling override for a single route.
///
/// `skip` wins over `limit`/`ttl_ms`. A missing `limit` or `ttl_ms` falls
/// back to the global value.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteThrottleConfig {
    /// Route template as registered on the router (e.g. "/api/echo").
    pub path: String,

    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub limit: Option<u64>,

    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

/// Request body configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum accepted body size in bytes. Accepts "10mb"-style strings.
    #[serde(deserialize_with = "deserialize_size")]
    pub max_size: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
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
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Bytes(u64),
    Text(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Bytes(n) => usize::try_from(n).map_err(serde::de::Error::custom),
        SizeValue::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}
