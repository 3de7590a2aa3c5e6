//! Latency and failure injection subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → sampler.rs (clock minute selects shape, draw bounded delay)
//!     → handler sleeps for the delay
//!     → failure.rs (optional synthetic failure)
//! ```
//!
//! # Design Decisions
//! - The clock is injected so the shape window can be fixed in tests
//! - Sampling is synchronous and never yields
//! - Random sources can be seeded for reproducible runs

pub mod clock;
pub mod failure;
pub mod sampler;

pub use clock::{Clock, FixedClock, SystemClock};
pub use failure::{FailureInjector, InjectedFailure};
pub use sampler::{LatencyError, LatencySampler, LatencyShape, SampledDelay};
