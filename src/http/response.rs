//! Error responses.
//!
//! Every error the service produces itself uses one JSON envelope:
//! `{statusCode, message, timestamp, path, method}`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: String,
    /// RFC 3339 UTC with millisecond precision.
    pub timestamp: String,
    pub path: String,
    pub method: String,
}

impl ErrorEnvelope {
    pub const INTERNAL_MESSAGE: &'static str = "Internal server error";

    pub fn new(status: StatusCode, message: impl Into<String>, method: &Method, path: &str) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path: path.to_string(),
            method: method.to_string(),
        }
    }

    pub fn internal(method: &Method, path: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, Self::INTERNAL_MESSAGE, method, path)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Last-resort handler: a panic anywhere below becomes a 500 envelope.
pub async fn catch_unhandled(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(
                method = %method,
                path = %path,
                panic = panic_message(panic.as_ref()),
                "Unhandled error while serving request"
            );
            ErrorEnvelope::internal(&method, &path).into_response()
        }
    }
}

/// Bound the whole request, body reads included, by `limit`.
pub async fn enforce_timeout(State(limit): State<Duration>, request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                method = %method,
                path = %path,
                timeout_secs = limit.as_secs(),
                "Request timed out"
            );
            ErrorEnvelope::new(StatusCode::REQUEST_TIMEOUT, "Request Timeout", &method, &path).into_response()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let envelope = ErrorEnvelope::new(StatusCode::NOT_FOUND, "Cannot GET /nope", &Method::GET, "/nope");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["statusCode"], 404);
        assert_eq!(value["method"], "GET");
        assert_eq!(value["path"], "/nope");
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert!(timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn panics_become_envelopes() {
        use axum::{middleware, routing::get, Router};
        use tower::ServiceExt;

        async fn explode() -> &'static str {
            panic!("secret detail")
        }

        let app = Router::new()
            .route("/boom", get(explode))
            .layer(middleware::from_fn(catch_unhandled));

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.message, ErrorEnvelope::INTERNAL_MESSAGE);
        assert_eq!(envelope.path, "/boom");
    }

    #[tokio::test]
    async fn slow_handlers_time_out_with_envelope() {
        use axum::{middleware, routing::get, Router};
        use tower::ServiceExt;

        async fn stall() -> &'static str {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }

        let app = Router::new()
            .route("/slow", get(stall))
            .layer(middleware::from_fn_with_state(Duration::from_millis(50), enforce_timeout));

        let response = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.status_code, 408);
        assert_eq!(envelope.message, "Request Timeout");
        assert_eq!(envelope.method, "GET");
        assert_eq!(envelope.path, "/slow");
    }

    #[test]
    fn unknown_status_degrades_to_500() {
        let mut envelope = ErrorEnvelope::internal(&Method::GET, "/");
        envelope.status_code = 42;
        assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
