//! Path prefix matching and rewriting.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefix test is a plain byte prefix, no segment awareness
//! - No regex to guarantee O(n) matching
//! - Rewrites join without doubling `/`

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefix {
    prefix: String,
}

impl PathPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// The part of `path` after the prefix, if it matches.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.prefix.as_str())
    }
}

/// Replaces a matched prefix with a fixed replacement.
///
/// `/api/proxy/tasks` → `/socket.io` turns `/api/proxy/tasks/foo` into
/// `/socket.io/foo`; `/websockify` → `/` turns `/websockify/x` into `/x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    prefix: PathPrefix,
    replacement: String,
}

impl PathRewrite {
    pub fn new(prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        let replacement = replacement.into();
        Self {
            prefix: PathPrefix::new(prefix),
            replacement: if replacement.is_empty() {
                "/".to_string()
            } else {
                replacement
            },
        }
    }

    pub fn prefix(&self) -> &PathPrefix {
        &self.prefix
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Rewrite a client-facing path into the backend path.
    pub fn apply(&self, path: &str) -> Option<String> {
        self.prefix
            .strip(path)
            .map(|rest| join(&self.replacement, rest))
    }

    /// Map a backend path back to the client-facing path.
    ///
    /// Recovers the original for paths that split at a `/` boundary. The
    /// bare prefix and the prefix with a trailing `/` rewrite to the same
    /// backend path when the replacement is `/`; that case comes back with
    /// the trailing `/`.
    pub fn reverse(&self, path: &str) -> Option<String> {
        let base = self.replacement.trim_end_matches('/');
        let rest = path.strip_prefix(base)?;
        Some(join(self.prefix.as_str(), rest))
    }
}

fn join(base: &str, rest: &str) -> String {
    if rest.is_empty() {
        return base.to_string();
    }
    match (base.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", base, &rest[1..]),
        (false, false) => format!("{}/{}", base, rest),
        _ => format!("{}{}", base, rest),
    }
}
