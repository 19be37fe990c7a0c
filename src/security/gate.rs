//! Admission pipeline.
//!
//! Every inbound request, upgrade handshakes included, runs through the same
//! ordered stages before routing:
//!
//! ```text
//! rate limit ──▶ CORS (OPTIONS halts with 204) ──▶ API key
//!     │                  │                             │
//!     ▼                  ▼                             ▼
//!    429             204 / 403                        401
//! ```
//!
//! A stage either lets the request continue or halts it with a [`Decision`].

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::config::AdmissionConfig;
use crate::security::auth::ApiKeyAuth;
use crate::security::cors::CorsPolicy;
use crate::security::rate_limit::FixedWindowLimiter;

/// Outcome of admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// CORS preflight answered locally with 204.
    Preflight,
    RateLimited,
    Unauthorized,
    CorsRejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Preflight => "preflight",
            Decision::RateLimited => "rate_limited",
            Decision::Unauthorized => "unauthorized",
            Decision::CorsRejected => "cors_rejected",
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Decision::RateLimited | Decision::Unauthorized | Decision::CorsRejected
        )
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The facts admission looks at.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionRequest<'a> {
    pub client: IpAddr,
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
}

/// Decision plus CORS state computed on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    /// Origin to echo. Only meaningful once the CORS stage has run.
    pub allow_origin: Option<HeaderValue>,
    /// Whether the CORS stage ran, i.e. CORS headers belong on the response.
    pub cors_evaluated: bool,
}

impl Verdict {
    fn new() -> Self {
        Self {
            decision: Decision::Allow,
            allow_origin: None,
            cors_evaluated: false,
        }
    }
}

/// Result of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt(Decision),
}

/// One step of the admission pipeline.
pub trait AdmissionStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, req: &AdmissionRequest<'_>, verdict: &mut Verdict, now: Instant) -> Flow;
}

/// Per-client fixed-window limit.
pub struct RateLimitStage {
    limiter: Arc<FixedWindowLimiter>,
}

impl AdmissionStage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn evaluate(&self, req: &AdmissionRequest<'_>, _verdict: &mut Verdict, now: Instant) -> Flow {
        if self.limiter.check_at(req.client, now) {
            Flow::Continue
        } else {
            tracing::warn!(client = %req.client, "Rate limit exceeded");
            Flow::Halt(Decision::RateLimited)
        }
    }
}

/// Computes the echoed origin and answers preflights.
pub struct CorsStage {
    policy: CorsPolicy,
}

impl AdmissionStage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn evaluate(&self, req: &AdmissionRequest<'_>, verdict: &mut Verdict, _now: Instant) -> Flow {
        verdict.cors_evaluated = true;
        verdict.allow_origin = self.policy.allowed_origin(req.headers);

        if self.policy.is_strict() && self.policy.is_foreign(req.headers) {
            tracing::warn!(client = %req.client, "Request from disallowed origin");
            return Flow::Halt(Decision::CorsRejected);
        }
        if *req.method == Method::OPTIONS {
            return Flow::Halt(Decision::Preflight);
        }
        Flow::Continue
    }
}

/// Shared-secret header check.
pub struct AuthStage {
    auth: ApiKeyAuth,
}

impl AdmissionStage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn evaluate(&self, req: &AdmissionRequest<'_>, _verdict: &mut Verdict, _now: Instant) -> Flow {
        if self.auth.authorize(req.headers) {
            Flow::Continue
        } else {
            tracing::warn!(client = %req.client, "Unauthorized request");
            Flow::Halt(Decision::Unauthorized)
        }
    }
}

/// Ordered admission pipeline owned by one gateway instance.
pub struct AccessGate {
    stages: Vec<Box<dyn AdmissionStage>>,
    limiter: Arc<FixedWindowLimiter>,
    cors: CorsPolicy,
}

impl AccessGate {
    /// Build the canonical pipeline: rate limit, CORS, auth.
    pub fn new(limiter: Arc<FixedWindowLimiter>, cors: CorsPolicy, auth: ApiKeyAuth) -> Self {
        let stages: Vec<Box<dyn AdmissionStage>> = vec![
            Box::new(RateLimitStage {
                limiter: limiter.clone(),
            }),
            Box::new(CorsStage {
                policy: cors.clone(),
            }),
            Box::new(AuthStage { auth }),
        ];

        Self {
            stages,
            limiter,
            cors,
        }
    }

    /// Build from configuration. The header name must already be validated.
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, axum::http::header::InvalidHeaderName> {
        let header = HeaderName::from_bytes(config.api_key_header.as_bytes())?;
        let limiter = Arc::new(FixedWindowLimiter::from_config(config));
        let cors = CorsPolicy::new(
            config.allowed_origins.iter().cloned(),
            &header,
            config.strict_origin,
        );
        let auth = ApiKeyAuth::new(header, config.api_key.clone());
        Ok(Self::new(limiter, cors, auth))
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    pub fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn evaluate(&self, req: &AdmissionRequest<'_>) -> Verdict {
        self.evaluate_at(req, Instant::now())
    }

    /// Run the stages in order until one halts.
    pub fn evaluate_at(&self, req: &AdmissionRequest<'_>, now: Instant) -> Verdict {
        let mut verdict = Verdict::new();
        for stage in &self.stages {
            if let Flow::Halt(decision) = stage.evaluate(req, &mut verdict, now) {
                verdict.decision = decision;
                break;
            }
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gate(max: u32, key: Option<&str>, strict: bool) -> AccessGate {
        let config = AdmissionConfig {
            window_ms: 60_000,
            max_requests: max,
            api_key: key.map(String::from),
            allowed_origins: vec!["http://localhost:9992".into()],
            strict_origin: strict,
            ..AdmissionConfig::default()
        };
        AccessGate::from_config(&config).unwrap()
    }

    fn client() -> IpAddr {
        IpAddr::from([10, 0, 0, 5])
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    fn decide(gate: &AccessGate, method: Method, headers: &HeaderMap, now: Instant) -> Verdict {
        gate.evaluate_at(
            &AdmissionRequest {
                client: client(),
                method: &method,
                headers,
            },
            now,
        )
    }

    #[test]
    fn stages_run_in_canonical_order() {
        assert_eq!(gate(1, None, false).stage_names(), ["rate_limit", "cors", "auth"]);
    }

    #[test]
    fn concrete_window_scenario() {
        let gate = gate(2, None, false);
        let t0 = Instant::now();
        let empty = HeaderMap::new();
        let at = |ms| t0 + Duration::from_millis(ms);

        assert_eq!(decide(&gate, Method::GET, &empty, at(0)).decision, Decision::Allow);
        assert_eq!(decide(&gate, Method::GET, &empty, at(10)).decision, Decision::Allow);
        assert_eq!(decide(&gate, Method::GET, &empty, at(20)).decision, Decision::RateLimited);
        assert_eq!(decide(&gate, Method::GET, &empty, at(61_000)).decision, Decision::Allow);
    }

    #[test]
    fn rate_limit_takes_precedence_over_auth() {
        let gate = gate(1, Some("s3cret"), false);
        let t0 = Instant::now();
        let no_key = HeaderMap::new();

        assert_eq!(decide(&gate, Method::GET, &no_key, t0).decision, Decision::Unauthorized);
        let verdict = decide(&gate, Method::GET, &no_key, t0);
        assert_eq!(verdict.decision, Decision::RateLimited);
        assert!(!verdict.cors_evaluated);
    }

    #[test]
    fn matching_key_is_allowed_and_mismatch_is_not() {
        let gate = gate(100, Some("s3cret"), false);
        let now = Instant::now();

        let good = headers(&[("x-api-key", "s3cret")]);
        let bad = headers(&[("x-api-key", "nope")]);
        assert_eq!(decide(&gate, Method::POST, &good, now).decision, Decision::Allow);
        assert_eq!(decide(&gate, Method::POST, &bad, now).decision, Decision::Unauthorized);
    }

    #[test]
    fn preflight_short_circuits_before_auth() {
        let gate = gate(100, Some("s3cret"), false);
        let h = headers(&[("origin", "http://localhost:9992")]);

        let verdict = decide(&gate, Method::OPTIONS, &h, Instant::now());
        assert_eq!(verdict.decision, Decision::Preflight);
        assert_eq!(verdict.allow_origin.unwrap(), "http://localhost:9992");
    }

    #[test]
    fn preflight_consumes_a_rate_limit_slot() {
        let gate = gate(1, None, false);
        let now = Instant::now();
        let empty = HeaderMap::new();

        assert_eq!(decide(&gate, Method::OPTIONS, &empty, now).decision, Decision::Preflight);
        assert_eq!(decide(&gate, Method::GET, &empty, now).decision, Decision::RateLimited);
    }

    #[test]
    fn unauthorized_still_carries_allowed_origin() {
        let gate = gate(100, Some("s3cret"), false);
        let h = headers(&[("origin", "http://localhost:9992")]);

        let verdict = decide(&gate, Method::GET, &h, Instant::now());
        assert_eq!(verdict.decision, Decision::Unauthorized);
        assert!(verdict.cors_evaluated);
        assert!(verdict.allow_origin.is_some());
    }

    #[test]
    fn foreign_origin_only_rejected_in_strict_mode() {
        let h = headers(&[("origin", "https://evil.test")]);
        let now = Instant::now();

        let lenient = decide(&gate(100, None, false), Method::GET, &h, now);
        assert_eq!(lenient.decision, Decision::Allow);
        assert!(lenient.allow_origin.is_none());

        let strict = decide(&gate(100, None, true), Method::GET, &h, now);
        assert_eq!(strict.decision, Decision::CorsRejected);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rate_limit_rejection_is_logged_at_warn() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let gate = gate(1, None, false);
        let t0 = Instant::now();
        tracing::subscriber::with_default(subscriber, || {
            decide(&gate, Method::GET, &HeaderMap::new(), t0);
            let verdict = decide(&gate, Method::GET, &HeaderMap::new(), t0);
            assert_eq!(verdict.decision, Decision::RateLimited);
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("Rate limit exceeded"), "{}", output);
    }
}
