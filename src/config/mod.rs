//! Gateway configuration.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment overrides, .env included (loader.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value/Arc with all subsystems
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup; a change means a restart
//! - An empty file (or no file) is a valid config
//! - serde checks shape, `validation.rs` checks meaning and reports every problem

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdmissionConfig, BackendsConfig, GatewayConfig, LimitsConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, TimeoutConfig,
};
