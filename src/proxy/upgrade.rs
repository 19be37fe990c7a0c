//! Upgrade dispatch and byte relaying.
//!
//! # Responsibilities
//! - Pick the upgrade-capable route for a handshake, in table order
//! - Give the request back untouched when no route claims it
//! - Pump bytes between the upgraded client and backend connections
//!
//! # Design Decisions
//! - Ownership of the request moves into exactly one consumer: a backend
//!   proxy or, when declined, the caller's own fallback
//! - Either side closing ends the relay; both connections are then dropped
//! - Relays stop on gateway shutdown

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::task::JoinHandle;

use crate::lifecycle::ShutdownSignal;
use crate::net::connection::SessionGuard;
use crate::proxy::{ProxyError, ReverseProxyPool, Target};
use crate::routing::PathRouter;

/// Outcome of offering an upgrade request to the route table.
pub enum Dispatch {
    /// A route claimed the request; `result` is what its backend produced.
    Relayed {
        target: Target,
        result: Result<Response, ProxyError>,
    },
    /// No upgrade-capable route matched. The request is returned unconsumed.
    Declined(Request<Body>),
}

/// Sends upgrade handshakes to the first upgrade-capable route that matches.
pub struct UpgradeDispatcher {
    router: PathRouter,
    pool: Arc<ReverseProxyPool>,
}

impl UpgradeDispatcher {
    pub fn new(router: PathRouter, pool: Arc<ReverseProxyPool>) -> Self {
        Self { router, pool }
    }

    pub async fn dispatch(&self, request: Request<Body>, client: IpAddr) -> Dispatch {
        let Some(rule) = self.router.route_upgrade(request.uri().path()) else {
            return Dispatch::Declined(request);
        };
        let Some(path_and_query) =
            rule.rewrite_path_and_query(request.uri().path(), request.uri().query())
        else {
            return Dispatch::Declined(request);
        };

        tracing::info!(
            route = %rule.name,
            backend = %rule.target,
            path = %request.uri().path(),
            upstream_path = %path_and_query,
            "Proxying upgrade"
        );

        let result = self
            .pool
            .upgrade(rule.target, request, &path_and_query, client)
            .await;
        Dispatch::Relayed {
            target: rule.target,
            result,
        }
    }
}

/// Why a relay ended.
#[derive(Debug)]
enum RelayEnd {
    ClientClosed(io::Result<u64>),
    BackendClosed(io::Result<u64>),
    Shutdown,
}

/// Relay bytes between the two sides once both upgrades complete.
pub fn spawn_relay(
    session: SessionGuard,
    client: OnUpgrade,
    backend: OnUpgrade,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(relay(session, client, backend, shutdown))
}

async fn relay(
    session: SessionGuard,
    client: OnUpgrade,
    backend: OnUpgrade,
    mut shutdown: ShutdownSignal,
) {
    let (client, backend) = match tokio::try_join!(client, backend) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "Upgrade did not complete");
            return;
        }
    };

    let (mut client_read, mut client_write) = tokio::io::split(TokioIo::new(client));
    let (mut backend_read, mut backend_write) = tokio::io::split(TokioIo::new(backend));

    let end = tokio::select! {
        copied = tokio::io::copy(&mut client_read, &mut backend_write) => RelayEnd::ClientClosed(copied),
        copied = tokio::io::copy(&mut backend_read, &mut client_write) => RelayEnd::BackendClosed(copied),
        _ = shutdown.recv() => RelayEnd::Shutdown,
    };

    match end {
        RelayEnd::ClientClosed(Ok(bytes)) => {
            tracing::debug!(session = %session.id(), bytes_up = bytes, "Client closed relay")
        }
        RelayEnd::BackendClosed(Ok(bytes)) => {
            tracing::debug!(session = %session.id(), bytes_down = bytes, "Backend closed relay")
        }
        RelayEnd::ClientClosed(Err(e)) | RelayEnd::BackendClosed(Err(e)) => {
            tracing::debug!(session = %session.id(), error = %e, "Relay ended with I/O error")
        }
        RelayEnd::Shutdown => {
            tracing::debug!(session = %session.id(), "Relay closed for shutdown")
        }
    }
    // Dropping the halves closes both connections; dropping the guard
    // releases the session.
}
