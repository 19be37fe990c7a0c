//! One backend and the two ways of reaching it.
//!
//! # Responsibilities
//! - Forward ordinary requests over the shared pooled client
//! - Replay upgrade handshakes on a dedicated connection
//! - Hand the two upgraded streams to a relay task
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered
//! - Upgrade connections bypass the pool; they never return to it
//! - A backend that answers an upgrade with anything but 101 is passed through

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::Scheme;
use axum::http::{HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use url::Url;

use crate::lifecycle::Shutdown;
use crate::net::RelayTracker;
use crate::proxy::upgrade::spawn_relay;
use crate::proxy::{ProxyError, Target};
use crate::security::headers::{
    append_forwarded_for, set_host, strip_hop_by_hop, strip_hop_by_hop_for_upgrade,
};

/// Settings shared by every backend proxy.
#[derive(Clone)]
pub struct UpstreamOptions {
    pub client: Client<HttpConnector, Body>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub relays: RelayTracker,
    pub shutdown: Shutdown,
}

/// Proxy for a single backend origin.
pub struct BackendProxy {
    target: Target,
    authority: String,
    connect_address: String,
    host_header: HeaderValue,
    options: UpstreamOptions,
}

impl BackendProxy {
    /// Build a proxy for the origin of `url`. Only plain `http` is accepted.
    pub fn new(target: Target, url: &str, options: UpstreamOptions) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidBackend {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if parsed.scheme() != "http" {
            return Err(invalid("only http backends are supported"));
        }
        let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let authority = match parsed.port() {
            Some(explicit) => format!("{}:{}", host, explicit),
            None => host.to_string(),
        };
        let host_header =
            HeaderValue::from_str(&authority).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            target,
            connect_address: format!("{}:{}", host, port),
            authority,
            host_header,
            options,
        })
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// `host[:port]` as sent in `Host`.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Forward an ordinary request to `path_and_query` on this backend.
    pub async fn forward(
        &self,
        request: Request<Body>,
        path_and_query: &str,
        client: IpAddr,
    ) -> Result<Response, ProxyError> {
        let (mut parts, body) = request.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, client);
        set_host(&mut parts.headers, &self.host_header);

        parts.uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()?;
        // The pooled client speaks HTTP/1.1 only, whatever the client used.
        parts.version = Version::HTTP_11;

        let upstream = Request::from_parts(parts, body);
        let response = tokio::time::timeout(
            self.options.request_timeout,
            self.options.client.request(upstream),
        )
        .await
        .map_err(|_| ProxyError::Timeout)??;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    /// Replay an upgrade handshake against this backend.
    ///
    /// On 101 the client receives the backend's handshake response and a relay
    /// task takes over both connections. Any other backend status is returned
    /// to the client as an ordinary response.
    pub async fn upgrade(
        &self,
        mut request: Request<Body>,
        path_and_query: &str,
        client: IpAddr,
    ) -> Result<Response, ProxyError> {
        let client_upgrade = hyper::upgrade::on(&mut request);
        let (mut parts, _body) = request.into_parts();
        strip_hop_by_hop_for_upgrade(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, client);
        set_host(&mut parts.headers, &self.host_header);

        let stream = tokio::time::timeout(
            self.options.connect_timeout,
            TcpStream::connect(&self.connect_address),
        )
        .await
        .map_err(|_| ProxyError::Timeout)?
        .map_err(|source| ProxyError::Connect {
            address: self.connect_address.clone(),
            source,
        })?;
        let _ = stream.set_nodelay(true);

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream)).await?;
        let target = self.target;
        tokio::spawn(async move {
            if let Err(e) = connection.with_upgrades().await {
                tracing::debug!(backend = %target, error = %e, "Upstream upgrade connection failed");
            }
        });

        let mut upstream = Request::builder()
            .method(parts.method)
            .uri(Uri::builder().path_and_query(path_and_query).build()?)
            .version(Version::HTTP_11)
            .body(Body::empty())?;
        *upstream.headers_mut() = parts.headers;

        let mut response = tokio::time::timeout(
            self.options.request_timeout,
            sender.send_request(upstream),
        )
        .await
        .map_err(|_| ProxyError::Timeout)??;

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            tracing::debug!(
                backend = %self.target,
                status = response.status().as_u16(),
                "Backend declined upgrade"
            );
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            return Ok(Response::from_parts(parts, Body::new(body)));
        }

        let backend_upgrade = hyper::upgrade::on(&mut response);
        let (parts, _body) = response.into_parts();

        let session = self.options.relays.open(self.target, path_and_query);
        tracing::info!(
            session = %session.id(),
            backend = %self.target,
            path = %path_and_query,
            "Upgrade accepted by backend"
        );
        spawn_relay(
            session,
            client_upgrade,
            backend_upgrade,
            self.options.shutdown.subscribe(),
        );

        let mut switching = Response::new(Body::empty());
        *switching.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        *switching.headers_mut() = parts.headers;
        Ok(switching)
    }
}
