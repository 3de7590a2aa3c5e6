//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build shipper → Install logging → Spawn shipper worker → Metrics → Listen
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Server stops accepting → Shipper drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
