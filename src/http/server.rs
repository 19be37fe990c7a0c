//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build every subsystem the handler needs from the configuration
//! - Create the Axum router with the catch-all handler
//! - Wire up middleware (request ID, tracing, body limit, admission)
//! - Hand upgrade handshakes to the upgrade dispatcher
//! - Forward everything else by longest prefix, renderer as fallback
//! - Serve until shutdown, sweeping rate-limit state in the background

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Uri},
    middleware,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::middleware::admission_middleware;
use crate::http::request::request_span;
use crate::http::response::upstream_failure;
use crate::http::websocket::is_upgrade_request;
use crate::lifecycle::{Shutdown, StartupError};
use crate::net::RelayTracker;
use crate::observability::metrics;
use crate::proxy::{Dispatch, ReverseProxyPool, Target, UpgradeDispatcher};
use crate::routing::{PathRouter, RouteTable};
use crate::security::AccessGate;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub router: PathRouter,
    pub dispatcher: Arc<UpgradeDispatcher>,
    pub pool: Arc<ReverseProxyPool>,
}

/// The gateway's HTTP front end.
pub struct GatewayServer {
    router: Router,
    gate: Arc<AccessGate>,
    relays: RelayTracker,
    config: GatewayConfig,
    shutdown: Shutdown,
}

impl GatewayServer {
    /// Build the gate, route table and backend proxies. Nothing is bound yet.
    pub fn new(config: GatewayConfig, shutdown: Shutdown) -> Result<Self, StartupError> {
        let gate = Arc::new(AccessGate::from_config(&config.admission)?);
        let table = Arc::new(RouteTable::standard(&config.backends)?);
        let relays = RelayTracker::new();
        let pool = Arc::new(ReverseProxyPool::new(
            &config.backends,
            &config.timeouts,
            relays.clone(),
            shutdown.clone(),
        )?);

        let router = PathRouter::new(table.clone());
        for rule in table.rules() {
            tracing::info!(
                route = %rule.name,
                prefix = %rule.prefix().as_str(),
                backend = %rule.target,
                upgrade = rule.supports_upgrade,
                "Route registered"
            );
        }
        tracing::info!(stages = ?gate.stage_names(), "Admission pipeline ready");

        let state = AppState {
            dispatcher: Arc::new(UpgradeDispatcher::new(router.clone(), pool.clone())),
            router,
            pool,
        };

        let router = Self::build_router(&config, gate.clone(), state);
        Ok(Self {
            router,
            gate,
            relays,
            config,
            shutdown,
        })
    }

    /// Catch-all routes and the middleware stack.
    ///
    /// Outermost first: request ID, response ID, trace, body limit, admission.
    fn build_router(config: &GatewayConfig, gate: Arc<AccessGate>, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(gate, admission_middleware))
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving the gateway without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let sweeper = Arc::clone(self.gate.limiter()).spawn_sweeper(
            Duration::from_secs(self.config.admission.sweep_interval_secs.max(1)),
            self.shutdown.subscribe(),
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let mut signal = self.shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.recv().await })
            .await?;

        // Serving can also end without a trigger; release the sweeper and relays.
        self.shutdown.trigger();
        let _ = sweeper.await;

        tracing::info!(open_relays = self.relays.active_count(), "Gateway stopped");
        Ok(())
    }
}

/// Catch-all handler. Admission has already passed when this runs.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let client = peer.ip();

    let (target, response) = if is_upgrade_request(request.headers()) {
        match state.dispatcher.dispatch(request, client).await {
            Dispatch::Relayed { target, result } => (
                target,
                result.unwrap_or_else(|e| upstream_failure(target, &e, true)),
            ),
            Dispatch::Declined(request) => {
                // The renderer owns every upgrade no route claims (dev reload, app sockets).
                let path_and_query = original_path_and_query(request.uri());
                tracing::debug!(path = %path_and_query, "Upgrade left to the renderer");
                let result = state
                    .pool
                    .upgrade(Target::Renderer, request, &path_and_query, client)
                    .await;
                (
                    Target::Renderer,
                    result.unwrap_or_else(|e| upstream_failure(Target::Renderer, &e, true)),
                )
            }
        }
    } else {
        let path = request.uri().path();
        let (target, path_and_query) = state
            .router
            .route(path)
            .and_then(|rule| {
                rule.rewrite_path_and_query(path, request.uri().query())
                    .map(|rewritten| (rule.target, rewritten))
            })
            .unwrap_or_else(|| (Target::Renderer, original_path_and_query(request.uri())));

        tracing::debug!(backend = %target, upstream_path = %path_and_query, "Forwarding request");
        let result = state
            .pool
            .forward(target, request, &path_and_query, client)
            .await;
        (
            target,
            result.unwrap_or_else(|e| upstream_failure(target, &e, false)),
        )
    };

    metrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        target.as_str(),
        start,
    );
    response
}

fn original_path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}
