//! Request identification.
//!
//! # Responsibilities
//! - Name the request ID header
//! - Read the ID back for logs and spans
//!
//! # Design Decisions
//! - IDs are UUID v4, assigned by the outermost layer unless the client sent one
//! - The ID travels upstream with the request and back on the response

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID, or `"unknown"` before the ID layer has run.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span for one HTTP request, keyed by its request ID.
pub fn request_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        request_id = %request_id(request.headers()),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
