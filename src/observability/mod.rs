//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, pretty or JSON)
//!     → metrics.rs (admission counters, store gauge, body size histogram)
//!
//! Consumers:
//!     → stdout (log aggregation picks it up from there)
//!     → Prometheus scrape endpoint on its own listener
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) is attached to every request span
//! - Metric updates go through the `metrics` facade; without an installed
//!   recorder they are no-ops, which keeps tests quiet

pub mod logging;
pub mod metrics;
