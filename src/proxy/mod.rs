//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → Target identified
//!     → pool.rs (BackendProxy for the target)
//!     → backend.rs
//!         - ordinary request: pooled client, streamed body both ways
//!         - upgrade: dedicated connection, replayed handshake, 101 back
//!     → upgrade.rs (dispatch by prefix, raw byte relay)
//! ```
//!
//! # Design Decisions
//! - One proxy per target, one shared connection pool for ordinary requests
//! - Host rewritten to the backend authority (changeOrigin)
//! - Nothing is retried; upgrades and streams are not idempotent
//! - A relay ends as soon as either side closes

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

pub mod backend;
pub mod pool;
pub mod upgrade;

pub use backend::BackendProxy;
pub use pool::ReverseProxyPool;
pub use upgrade::{Dispatch, UpgradeDispatcher};

/// Backend targets the gateway knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// UI renderer; fallback for everything no route claims.
    Renderer,
    TaskApi,
    DesktopStream,
    LocalDesktop,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Renderer => "renderer",
            Target::TaskApi => "task_api",
            Target::DesktopStream => "desktop_stream",
            Target::LocalDesktop => "local_desktop",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream failures. None of them is retried.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidBackend { url: String, reason: String },

    #[error("no backend configured for {0}")]
    UnknownTarget(Target),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream timed out")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("upstream handshake failed: {0}")]
    Handshake(#[from] hyper::Error),
}

impl ProxyError {
    /// Status surfaced to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}
