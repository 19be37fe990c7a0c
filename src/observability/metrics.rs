//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, target
//! - `gateway_request_duration_seconds` (histogram): time to response headers, by target
//! - `gateway_admission_rejections_total` (counter): gate rejections by decision
//! - `gateway_active_relays` (gauge): live upgraded connections
//! - `gateway_tracked_clients` (gauge): rate-limit windows held in memory
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, target: &'static str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "target" => target,
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "target" => target)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_admission_rejected(decision: &'static str) {
    counter!("gateway_admission_rejections_total", "decision" => decision).increment(1);
}

pub fn set_active_relays(count: u64) {
    gauge!("gateway_active_relays").set(count as f64);
}

pub fn set_tracked_clients(count: usize) {
    gauge!("gateway_tracked_clients").set(count as f64);
}
