//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from the validated configuration
//! - Bind the listener last (traffic only when ready)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and ends the process non-zero
//! - Subsystems initialize in order, not concurrently

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, GatewayConfig};
use crate::http::GatewayServer;
use crate::lifecycle::Shutdown;
use crate::net::listener::{self, ListenerError};
use crate::proxy::ProxyError;
use crate::routing::RouteError;

/// Fatal errors raised before the gateway starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("routes: {0}")]
    Routes(#[from] RouteError),

    #[error("backends: {0}")]
    Proxy(#[from] ProxyError),

    #[error("admission: invalid API key header: {0}")]
    ApiKeyHeader(#[from] axum::http::header::InvalidHeaderName),

    #[error(transparent)]
    Bind(#[from] ListenerError),
}

/// Build the server and bind its listener.
pub async fn prepare(
    config: GatewayConfig,
    shutdown: Shutdown,
) -> Result<(GatewayServer, TcpListener), StartupError> {
    let listener_config = config.listener.clone();
    let server = GatewayServer::new(config, shutdown)?;
    let listener = listener::bind(&listener_config).await?;
    Ok((server, listener))
}
