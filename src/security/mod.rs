//! Request admission subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (route already matched):
//!     → identity.rs (client address, optional X-Forwarded-For)
//!     → rate_limit.rs (per client + route window, via store.rs)
//!         reject: 429 + Retry-After
//!     → limits.rs (stream body through ByteCounter, GET/HEAD/DELETE skip)
//!         reject: 413
//!     → business handler
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs first, before a single body byte is read
//! - Both guards render rejections through error.rs, so clients see one envelope
//! - Counter store failures fail open; body limit failures fail closed
//! - Settings live behind an `ArcSwap` so config reloads apply to the next request

pub mod error;
pub mod identity;
pub mod limits;
pub mod rate_limit;
pub mod size;
pub mod store;

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::GatewayConfig;
use self::rate_limit::{RateLimiter, ThrottleSettings};
use self::store::CounterStore;

pub use error::{AdmissionError, RequestContext};
pub use identity::ClientIdentity;
pub use limits::body_limit_middleware;
pub use rate_limit::rate_limit_middleware;

/// Admission settings in effect for a request.
#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub throttle: ThrottleSettings,
    pub max_body_bytes: usize,
}

impl AdmissionSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            throttle: ThrottleSettings::from_config(&config.throttle),
            max_body_bytes: config.body.max_size,
        }
    }
}

/// Shared state of the admission middleware.
#[derive(Clone)]
pub struct AdmissionState {
    settings: Arc<ArcSwap<AdmissionSettings>>,
    limiter: RateLimiter,
}

impl AdmissionState {
    pub fn new(config: &GatewayConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            settings: Arc::new(ArcSwap::from_pointee(AdmissionSettings::from_config(config))),
            limiter: RateLimiter::new(store),
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Arc<AdmissionSettings> {
        self.settings.load_full()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Replace the live settings. Existing counters are kept.
    pub fn reload(&self, config: &GatewayConfig) {
        let settings = AdmissionSettings::from_config(config);
        tracing::info!(
            throttle_limit = settings.throttle.global.limit,
            throttle_ttl_ms = settings.throttle.global.ttl.as_millis() as u64,
            max_body_bytes = settings.max_body_bytes,
            "Admission settings reloaded"
        );
        self.settings.store(Arc::new(settings));
    }
}
