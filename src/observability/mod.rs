//! Logs and metrics for the gateway.
//!
//! # Data Flow
//! ```text
//! admission, proxying, relays
//!     → logging.rs  (tracing events under the per-request span)
//!     → metrics.rs  (request, rejection and relay series)
//!
//! Outputs:
//!     → stdout, pretty for humans or one JSON object per line
//!     → Prometheus scrape listener, only if `metrics_address` is set
//! ```
//!
//! # Design Decisions
//! - Every HTTP span carries the `x-request-id` that is also sent upstream
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
