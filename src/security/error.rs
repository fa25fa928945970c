//! Admission failures and their wire representation.

use axum::{
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::ErrorEnvelope;
use crate::security::rate_limit::RateLimitInfo;

/// Method and path of the request being rejected.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
        }
    }
}

/// A terminal admission outcome other than "admit".
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Too Many Requests")]
    TooManyRequests { info: RateLimitInfo },

    #[error("Request body too large. Maximum size is {limit_description}")]
    PayloadTooLarge { limit_description: String },

    /// The transport failed while the body was being read.
    #[error("request body transport error: {0}")]
    Transport(#[source] axum::Error),
}

impl AdmissionError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error envelope for the request described by `context`.
    pub fn into_response_at(self, context: &RequestContext) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Transport(e) => {
                tracing::error!(error = %e, path = %context.path, "Request body stream failed");
                ErrorEnvelope::INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        let mut response = ErrorEnvelope::new(status, message, &context.method, &context.path).into_response();
        if let Self::TooManyRequests { info } = self {
            info.apply(response.headers_mut());
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(info.reset_after_secs));
        }
        response
    }
}
