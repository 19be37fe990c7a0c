//! Shared-secret API key check.

use axum::http::{HeaderMap, HeaderName};
use subtle::ConstantTimeEq;

/// Compares a request header against a static key.
///
/// With no key configured every request passes (open-access mode).
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    header: HeaderName,
    key: Option<String>,
}

impl ApiKeyAuth {
    pub fn new(header: HeaderName, key: Option<String>) -> Self {
        Self {
            header,
            key: key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// True when the request may proceed as far as authentication is concerned.
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.key else {
            return true;
        };

        match headers.get(&self.header) {
            // Exact, case-sensitive byte comparison in constant time.
            Some(value) => value.as_bytes().ct_eq(expected.as_bytes()).into(),
            None => false,
        }
    }
}
