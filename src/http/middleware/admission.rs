//! Admission middleware.
//!
//! Runs the access gate for every request, upgrades included, before any
//! routing happens. Rejections are answered here and never reach a backend.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::status_response;
use crate::observability::metrics;
use crate::security::{AccessGate, AdmissionRequest, Decision};

pub async fn admission_middleware(
    State(gate): State<Arc<AccessGate>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let verdict = gate.evaluate(&AdmissionRequest {
        client: peer.ip(),
        method: request.method(),
        headers: request.headers(),
    });

    if verdict.decision.is_rejection() {
        metrics::record_admission_rejected(verdict.decision.as_str());
    }

    // Stages log their own rejections.
    let mut response = match verdict.decision {
        Decision::Allow => next.run(request).await,
        // 204 carries neither a body nor Content-Length.
        Decision::Preflight => StatusCode::NO_CONTENT.into_response(),
        Decision::RateLimited => status_response(StatusCode::TOO_MANY_REQUESTS),
        Decision::Unauthorized => status_response(StatusCode::UNAUTHORIZED),
        Decision::CorsRejected => status_response(StatusCode::FORBIDDEN),
    };

    if verdict.cors_evaluated {
        gate.cors()
            .apply(response.headers_mut(), verdict.allow_origin.as_ref());
    }
    response
}
