//! Business handlers behind the admission layer.

use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::response::ErrorEnvelope;

#[derive(Debug, Serialize, Deserialize)]
pub struct Pong {
    pub message: String,
}

pub async fn ping() -> Json<Pong> {
    Json(Pong {
        message: "pong".to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoSummary {
    pub received_bytes: usize,
    pub content_type: Option<String>,
}

/// Report what arrived. The body has already passed the size guard.
pub async fn echo(headers: HeaderMap, body: Bytes) -> Json<EchoSummary> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    Json(EchoSummary {
        received_bytes: body.len(),
        content_type,
    })
}

pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    let message = format!("Cannot {} {}", method, uri.path());
    ErrorEnvelope::new(StatusCode::NOT_FOUND, message, &method, uri.path())
}

/// A known path hit with a method it does not serve.
pub async fn method_not_allowed(method: Method, uri: Uri) -> impl IntoResponse {
    let message = format!("Cannot {} {}", method, uri.path());
    ErrorEnvelope::new(StatusCode::METHOD_NOT_ALLOWED, message, &method, uri.path())
}
