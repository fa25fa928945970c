//! Request admission gateway library.
//!
//! Every request passes a per-client rate limiter and then a body size
//! guard before any handler runs; rejections share one JSON error envelope.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{AdmissionError, AdmissionState};
