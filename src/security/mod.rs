//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → gate.rs (ordered admission stages)
//!         → rate_limit.rs (per-IP fixed window)
//!         → cors.rs (origin allow-list, preflight)
//!         → auth.rs (shared API key)
//!     → headers.rs (hop-by-hop stripping, X-Forwarded-For, Host) on the way upstream
//! ```
//!
//! # Design Decisions
//! - Admission happens before routing; rejections never reach a backend
//! - Admission state is owned by the gateway instance, not global
//! - No error detail beyond a status line goes back to the client

pub mod auth;
pub mod cors;
pub mod gate;
pub mod headers;
pub mod rate_limit;

pub use gate::{AccessGate, AdmissionRequest, Decision, Verdict};
pub use rate_limit::FixedWindowLimiter;
