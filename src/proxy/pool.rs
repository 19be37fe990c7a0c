//! Backend proxies keyed by target.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::{BackendsConfig, TimeoutConfig};
use crate::lifecycle::Shutdown;
use crate::net::RelayTracker;
use crate::proxy::backend::{BackendProxy, UpstreamOptions};
use crate::proxy::{ProxyError, Target};

/// Every configured backend, sharing one pooled HTTP/1.1 client.
pub struct ReverseProxyPool {
    proxies: HashMap<Target, Arc<BackendProxy>>,
}

impl ReverseProxyPool {
    pub fn new(
        backends: &BackendsConfig,
        timeouts: &TimeoutConfig,
        relays: RelayTracker,
        shutdown: Shutdown,
    ) -> Result<Self, ProxyError> {
        let connect_timeout = Duration::from_secs(timeouts.connect_secs);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let options = UpstreamOptions {
            client,
            connect_timeout,
            request_timeout: Duration::from_secs(timeouts.request_secs),
            relays,
            shutdown,
        };

        let mut configured = vec![
            (Target::Renderer, backends.renderer_url.as_str()),
            (Target::TaskApi, backends.task_api_url.as_str()),
            (Target::DesktopStream, backends.desktop_stream_url.as_str()),
        ];
        if let Some(local) = backends.local_desktop_url.as_deref() {
            configured.push((Target::LocalDesktop, local));
        }

        let mut proxies = HashMap::with_capacity(configured.len());
        for (target, url) in configured {
            let proxy = BackendProxy::new(target, url, options.clone())?;
            tracing::debug!(backend = %target, authority = %proxy.authority(), "Backend registered");
            proxies.insert(target, Arc::new(proxy));
        }

        Ok(Self { proxies })
    }

    pub fn get(&self, target: Target) -> Option<&Arc<BackendProxy>> {
        self.proxies.get(&target)
    }

    pub fn contains(&self, target: Target) -> bool {
        self.proxies.contains_key(&target)
    }

    pub async fn forward(
        &self,
        target: Target,
        request: Request<Body>,
        path_and_query: &str,
        client: IpAddr,
    ) -> Result<Response, ProxyError> {
        let proxy = self.get(target).ok_or(ProxyError::UnknownTarget(target))?;
        proxy.forward(request, path_and_query, client).await
    }

    pub async fn upgrade(
        &self,
        target: Target,
        request: Request<Body>,
        path_and_query: &str,
        client: IpAddr,
    ) -> Result<Response, ProxyError> {
        let proxy = self.get(target).ok_or(ProxyError::UnknownTarget(target))?;
        proxy.upgrade(request, path_and_query, client).await
    }
}
