//! Route table and lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Longest-prefix lookup for ordinary HTTP requests
//! - Priority-order lookup for upgrade-capable routes
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (the table holds a handful of routes)
//! - Duplicate prefixes rejected at startup
//! - Explicit NoMatch (`None`) rather than silent default; the caller picks the fallback

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::config::BackendsConfig;
use crate::proxy::Target;
use crate::routing::matcher::{PathPrefix, PathRewrite};

/// Error raised while compiling the route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route {name}: prefix {prefix:?} must be non-empty and start with '/'")]
    InvalidPrefix { name: String, prefix: String },

    #[error("routes {first} and {second} share the prefix {prefix:?}")]
    DuplicatePrefix {
        first: String,
        second: String,
        prefix: String,
    },

    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
}

/// One prefix route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub name: String,
    pub target: Target,
    pub rewrite: PathRewrite,
    pub supports_upgrade: bool,
}

impl RouteRule {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        replacement: impl Into<String>,
        target: Target,
        supports_upgrade: bool,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            rewrite: PathRewrite::new(prefix, replacement),
            supports_upgrade,
        }
    }

    pub fn prefix(&self) -> &PathPrefix {
        self.rewrite.prefix()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.prefix().matches(path)
    }

    /// Rewrite the path and re-attach the query, giving the upstream
    /// path-and-query. `None` when the path does not carry this route's prefix.
    pub fn rewrite_path_and_query(&self, path: &str, query: Option<&str>) -> Option<String> {
        let path = self.rewrite.apply(path)?;
        Some(match query {
            Some(q) => format!("{}?{}", path, q),
            None => path,
        })
    }
}

/// Validated, ordered set of routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Compile `rules`. Order is kept; it is the upgrade priority order.
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, RouteError> {
        for (i, rule) in rules.iter().enumerate() {
            let prefix = rule.prefix().as_str();
            if prefix.is_empty() || !prefix.starts_with('/') {
                return Err(RouteError::InvalidPrefix {
                    name: rule.name.clone(),
                    prefix: prefix.to_string(),
                });
            }

            for other in &rules[..i] {
                let other_prefix = other.prefix().as_str();
                if other_prefix == prefix {
                    return Err(RouteError::DuplicatePrefix {
                        first: other.name.clone(),
                        second: rule.name.clone(),
                        prefix: prefix.to_string(),
                    });
                }
                if prefix.starts_with(other_prefix) || other_prefix.starts_with(prefix) {
                    tracing::debug!(
                        first = %other.name,
                        second = %rule.name,
                        "Nested route prefixes; longest prefix wins for HTTP"
                    );
                }
            }
        }

        Ok(Self { rules })
    }

    /// The fixed gateway table.
    ///
    /// | Prefix | Rewrite | Target |
    /// |---|---|---|
    /// | `/api/proxy/tasks` | `/socket.io` | task API |
    /// | `/api/proxy/websockify` | path of the desktop-stream URL | desktop stream |
    /// | `/websockify` | `/` | local desktop stream, when configured |
    pub fn standard(backends: &BackendsConfig) -> Result<Self, RouteError> {
        let desktop = Url::parse(&backends.desktop_stream_url).map_err(|e| {
            RouteError::InvalidBackendUrl {
                url: backends.desktop_stream_url.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut rules = vec![
            RouteRule::new("tasks", "/api/proxy/tasks", "/socket.io", Target::TaskApi, true),
            RouteRule::new(
                "desktop-stream",
                "/api/proxy/websockify",
                desktop.path(),
                Target::DesktopStream,
                true,
            ),
        ];
        if backends.local_desktop_url.is_some() {
            rules.push(RouteRule::new(
                "local-desktop",
                "/websockify",
                "/",
                Target::LocalDesktop,
                true,
            ));
        }

        Self::new(rules)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

/// Picks the route for ordinary HTTP requests.
#[derive(Debug, Clone)]
pub struct PathRouter {
    table: Arc<RouteTable>,
}

impl PathRouter {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    /// Longest matching prefix, or `None` for the fallback handler.
    pub fn route(&self, path: &str) -> Option<&RouteRule> {
        self.table
            .rules()
            .iter()
            .filter(|rule| rule.matches(path))
            .max_by_key(|rule| rule.prefix().len())
    }

    /// First upgrade-capable route in table order.
    pub fn route_upgrade(&self, path: &str) -> Option<&RouteRule> {
        self.table
            .rules()
            .iter()
            .find(|rule| rule.supports_upgrade && rule.matches(path))
    }
}
