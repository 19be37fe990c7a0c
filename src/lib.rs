//! Edge gateway library.
//!
//! Admission (rate limit, CORS, API key), prefix routing and reverse
//! proxying for HTTP and upgraded connections.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
