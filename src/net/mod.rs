//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (bind hostname:port)
//!     → Hand the listener to the HTTP server
//!
//! Upgrade accepted
//!     → connection.rs (session id, live relay count)
//!     → relay runs until either side closes
//! ```

pub mod connection;
pub mod listener;

pub use connection::{RelayTracker, SessionGuard, SessionId};
