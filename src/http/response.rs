//! Gateway-generated responses.
//!
//! # Responsibilities
//! - Plain status responses for admission outcomes
//! - Map upstream failures to 502/504
//!
//! # Design Decisions
//! - Bodies carry the status reason only; upstream error detail goes to the log
//! - A failed upgrade closes the client connection

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::proxy::{ProxyError, Target};

/// `status` with its canonical reason phrase as the body.
pub fn status_response(status: StatusCode) -> Response {
    (status, status.canonical_reason().unwrap_or("Error")).into_response()
}

/// Log `error` and turn it into the client-facing response.
pub fn upstream_failure(target: Target, error: &ProxyError, upgrade: bool) -> Response {
    tracing::error!(backend = %target, upgrade, error = %error, "Upstream request failed");

    let mut response = status_response(error.status());
    if upgrade {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}
