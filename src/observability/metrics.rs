//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_requests_admitted_total` (counter)
//! - `gatekeeper_requests_rejected_total{reason}` (counter): rate_limit, payload_too_large
//! - `gatekeeper_throttle_store_errors_total` (counter)
//! - `gatekeeper_throttle_tracked_keys` (gauge)
//! - `gatekeeper_request_body_bytes` (histogram)

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_admitted() {
    counter!("gatekeeper_requests_admitted_total").increment(1);
}

pub fn record_rejected(reason: &'static str) {
    counter!("gatekeeper_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_store_error() {
    counter!("gatekeeper_throttle_store_errors_total").increment(1);
}

pub fn record_tracked_keys(count: usize) {
    gauge!("gatekeeper_throttle_tracked_keys").set(count as f64);
}

pub fn record_body_bytes(len: usize) {
    histogram!("gatekeeper_request_body_bytes").record(len as f64);
}
