//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, span)
//!     → middleware/admission.rs (rate limit, CORS, API key)
//!     → server.rs handler
//!         - upgrade handshake → proxy::UpgradeDispatcher, renderer fallback
//!         - anything else → longest prefix route, renderer fallback
//!     → response.rs (status responses, upstream failures)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
