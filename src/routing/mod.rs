//! Path-prefix routing to backend targets.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup)
//!     → matcher.rs (prefix test, rewrite)
//!     → Return: matched RouteRule or NoMatch (renderer fallback)
//!
//! Route Compilation (at startup):
//!     BackendsConfig
//!     → RouteTable::standard (fixed prefixes)
//!     → Validate prefixes
//!     → Freeze as immutable Arc<RouteTable>
//! ```
//!
//! # Design Decisions
//! - The table is fixed once built and shared behind an `Arc`
//! - Matching is a plain `starts_with` on the path
//! - HTTP: longest prefix wins; upgrades: first upgrade-capable rule wins

pub mod matcher;
pub mod router;

pub use matcher::{PathPrefix, PathRewrite};
pub use router::{PathRouter, RouteError, RouteRule, RouteTable};
