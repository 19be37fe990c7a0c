//! Upgrade handshake detection.
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Gateway ←──── raw bytes ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Detection looks at `Connection`/`Upgrade` only; the protocol is not checked
//! - Frames are never parsed; the relay copies bytes once both sides switch

use axum::http::{header, HeaderMap};

/// True when `Connection` carries the `upgrade` token and `Upgrade` is set.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}
