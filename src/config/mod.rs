//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (THROTTLE_TTL / THROTTLE_LIMIT / MAX_BODY_SIZE overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates new config
//!     → server swaps the live admission settings
//! ```

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BodyConfig, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RouteThrottleConfig, ThrottleConfig, TimeoutConfig, TlsConfig,
};
