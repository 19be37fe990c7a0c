//! Process lifecycle: bring-up, signal handling and teardown.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build gate, routes, proxies → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close relays → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The listener is bound last, so a bad route or backend never opens a port
//! - Relays and the limiter sweep listen on the same shutdown channel

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::StartupError;
