//! Request body size enforcement.
//!
//! The body is read frame by frame and every chunk is counted before it is
//! buffered. Once the running total passes the ceiling the body is
//! dropped, which stops the transport from being polled, and the request
//! is rejected with 413. Bodyless methods are not inspected at all.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use futures_util::StreamExt;
use thiserror::Error;

use crate::observability::metrics;
use crate::security::error::{AdmissionError, RequestContext};
use crate::security::size::format_bytes;
use crate::security::AdmissionState;

/// Methods whose body carries no meaning; they bypass counting.
pub fn skips_body(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::DELETE)
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("body exceeded {limit} bytes")]
pub struct LimitExceeded {
    pub limit: usize,
    pub received: usize,
}

/// Running byte total for one request body.
#[derive(Debug)]
pub struct ByteCounter {
    received: usize,
    limit: usize,
}

impl ByteCounter {
    pub fn new(limit: usize) -> Self {
        Self { received: 0, limit }
    }

    /// Account for a chunk of `len` bytes. A total equal to the limit is fine.
    pub fn observe(&mut self, len: usize) -> Result<(), LimitExceeded> {
        self.received = self.received.saturating_add(len);
        if self.received > self.limit {
            Err(LimitExceeded {
                limit: self.limit,
                received: self.received,
            })
        } else {
            Ok(())
        }
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[derive(Debug, Error)]
pub enum BodyLimitError {
    #[error(transparent)]
    TooLarge(#[from] LimitExceeded),

    #[error("body stream failed: {0}")]
    Transport(#[source] axum::Error),
}

impl From<BodyLimitError> for AdmissionError {
    fn from(err: BodyLimitError) -> Self {
        match err {
            BodyLimitError::TooLarge(e) => AdmissionError::PayloadTooLarge {
                limit_description: format_bytes(e.limit as u64),
            },
            BodyLimitError::Transport(e) => AdmissionError::Transport(e),
        }
    }
}

/// Read `body` to the end, failing as soon as it grows past `limit` bytes.
pub async fn read_limited(body: Body, limit: usize) -> Result<Vec<u8>, BodyLimitError> {
    let mut counter = ByteCounter::new(limit);
    let mut buffer = Vec::new();
    let mut stream = body.into_data_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyLimitError::Transport)?;
        counter.observe(chunk.len())?;
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

/// Middleware enforcing the configured maximum body size.
pub async fn body_limit_middleware(
    State(admission): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if skips_body(request.method()) {
        metrics::record_admitted();
        return next.run(request).await;
    }

    let limit = admission.settings().max_body_bytes;
    let context = RequestContext::from_request(&request);
    let (parts, body) = request.into_parts();

    match read_limited(body, limit).await {
        Ok(bytes) => {
            metrics::record_body_bytes(bytes.len());
            metrics::record_admitted();
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(BodyLimitError::TooLarge(exceeded)) => {
            tracing::warn!(
                method = %context.method,
                path = %context.path,
                limit = exceeded.limit,
                received = exceeded.received,
                "Request body too large"
            );
            metrics::record_rejected("payload_too_large");
            AdmissionError::from(BodyLimitError::TooLarge(exceeded)).into_response_at(&context)
        }
        Err(err) => AdmissionError::from(err).into_response_at(&context),
    }
}
