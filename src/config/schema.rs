//! Config sections and their defaults.
//!
//! Every section is `#[serde(default)]`, so a TOML file only names what it changes.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (hostname, port).
    pub listener: ListenerConfig,

    /// Admission policy (rate limit, API key, CORS).
    pub admission: AdmissionConfig,

    /// Backend base URLs.
    pub backends: BackendsConfig,

    /// Upstream timeouts.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Hostname or IP to bind (e.g., "localhost", "0.0.0.0").
    pub hostname: String,

    /// TCP port.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        if self.hostname.contains(':') && !self.hostname.starts_with('[') {
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 9992,
        }
    }
}

/// Admission policy applied to every inbound request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Fixed rate-limit window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per client per window.
    pub max_requests: u32,

    /// Shared API key. `None` disables authentication.
    pub api_key: Option<String>,

    /// Header carrying the API key.
    pub api_key_header: String,

    /// Origins echoed back in `Access-Control-Allow-Origin`.
    pub allowed_origins: Vec<String>,

    /// Reject requests whose `Origin` is present but not allowed (403).
    pub strict_origin: bool,

    /// How often expired client windows are evicted, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
            api_key: None,
            api_key_header: "x-api-key".to_string(),
            allowed_origins: vec!["http://localhost:9992".to_string()],
            strict_origin: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Backend base URLs. All must use the `http` scheme.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// UI renderer; receives every request no route claims.
    pub renderer_url: String,

    /// Task API; receives `/api/proxy/tasks` rewritten to `/socket.io`.
    pub task_api_url: String,

    /// Desktop stream; its path replaces `/api/proxy/websockify`.
    pub desktop_stream_url: String,

    /// Same-host desktop stream for `/websockify`. Route omitted when unset.
    pub local_desktop_url: Option<String>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            renderer_url: "http://localhost:3000".to_string(),
            task_api_url: "http://localhost:9991".to_string(),
            desktop_stream_url: "http://localhost:9990/websockify".to_string(),
            local_desktop_url: Some("http://localhost:6080".to_string()),
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for upstream response headers in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus endpoint bind address. Metrics are disabled when unset.
    pub metrics_address: Option<String>,
}

impl ObservabilityConfig {
    /// Parsed metrics address. `None` when unset or not a socket address;
    /// validation rejects the latter before this is used.
    pub fn metrics_socket_addr(&self) -> Option<SocketAddr> {
        self.metrics_address.as_deref()?.parse().ok()
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}
