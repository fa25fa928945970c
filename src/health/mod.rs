//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → indicators.rs (process uptime, counter store reachability)
//!     → 200 {status: "ok", ...} when every indicator is up
//!     → 503 {status: "error", ...} otherwise
//! ```
//!
//! # Design Decisions
//! - Throttling is skipped for /health in the default config, so probes
//!   never compete with clients for quota
//! - Indicator checks are bounded by the store timeout

pub mod indicators;

pub use indicators::{health, HealthReport};
