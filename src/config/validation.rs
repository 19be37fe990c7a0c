//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, timeouts > 0)
//! - Check backend URLs are plain `http` with a host
//! - Check the metrics address parses as a socket address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("{field} must use the http scheme, got {scheme}")]
    UnsupportedScheme { field: &'static str, scheme: String },

    #[error("admission.api_key_header {0:?} is not a valid header name")]
    InvalidHeaderName(String),

    #[error("admission.allowed_origins contains an empty entry")]
    EmptyOrigin,

    #[error("observability.metrics_address {address:?} is not a socket address: {reason}")]
    InvalidSocketAddr { address: String, reason: String },
}

/// Validate a loaded configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let admission = &config.admission;
    if admission.window_ms == 0 {
        errors.push(ValidationError::Zero { field: "admission.window_ms" });
    }
    if admission.max_requests == 0 {
        errors.push(ValidationError::Zero { field: "admission.max_requests" });
    }
    if admission.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "admission.sweep_interval_secs" });
    }
    if HeaderName::from_bytes(admission.api_key_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(admission.api_key_header.clone()));
    }
    if admission.allowed_origins.iter().any(|o| o.trim().is_empty()) {
        errors.push(ValidationError::EmptyOrigin);
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "limits.max_body_bytes" });
    }

    if let Some(address) = &config.observability.metrics_address {
        if let Err(e) = address.parse::<SocketAddr>() {
            errors.push(ValidationError::InvalidSocketAddr {
                address: address.clone(),
                reason: e.to_string(),
            });
        }
    }

    let backends = &config.backends;
    check_url("backends.renderer_url", &backends.renderer_url, &mut errors);
    check_url("backends.task_api_url", &backends.task_api_url, &mut errors);
    check_url("backends.desktop_stream_url", &backends.desktop_stream_url, &mut errors);
    if let Some(url) = &backends.local_desktop_url {
        check_url("backends.local_desktop_url", url, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &'static str, raw: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(raw) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
        }),
        Ok(url) if url.host_str().is_none() => errors.push(ValidationError::InvalidUrl {
            field,
            reason: "missing host".to_string(),
        }),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidUrl {
            field,
            reason: e.to_string(),
        }),
    }
}
