//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, trace span)
//!     → security (rate limit, then body size)
//!     → handlers.rs (business handlers, 404 fallback)
//!     → response.rs (error envelope, panic → 500)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::ErrorEnvelope;
pub use server::{AppState, HttpServer};
