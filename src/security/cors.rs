//! CORS policy: origin allow-list and response headers.
//!
//! A disallowed origin only loses the `Access-Control-Allow-Origin` header;
//! the browser then refuses the response. Strict mode turns that into a 403.

use std::collections::HashSet;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

const ALLOW_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS,PATCH";

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: HashSet<String>,
    allow_headers: HeaderValue,
    strict: bool,
}

impl CorsPolicy {
    /// `api_key_header` is advertised in `Access-Control-Allow-Headers`.
    pub fn new<I, S>(allowed_origins: I, api_key_header: &HeaderName, strict: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allow_headers = HeaderValue::from_str(&format!("Content-Type, {}", api_key_header))
            .unwrap_or_else(|_| HeaderValue::from_static("Content-Type"));

        Self {
            allowed_origins: allowed_origins.into_iter().map(Into::into).collect(),
            allow_headers,
            strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The `Origin` value to echo back, if the request carries an allowed one.
    pub fn allowed_origin(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        let origin = headers.get(header::ORIGIN)?;
        let origin_str = origin.to_str().ok()?;
        self.allowed_origins
            .contains(origin_str)
            .then(|| origin.clone())
    }

    /// True when the request names an origin outside the allow-list.
    pub fn is_foreign(&self, headers: &HeaderMap) -> bool {
        headers.contains_key(header::ORIGIN) && self.allowed_origin(headers).is_none()
    }

    /// Write the CORS response headers. `allow_origin` comes from
    /// [`allowed_origin`](Self::allowed_origin).
    pub fn apply(&self, headers: &mut HeaderMap, allow_origin: Option<&HeaderValue>) {
        match allow_origin {
            Some(origin) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
            None => {
                headers.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN);
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}
