//! Animal buttons API library.
//!
//! A small HTTP service whose routes inject synthetic latency and failures,
//! instrumented with Prometheus metrics and structured logs shipped to an
//! OpenSearch index.

pub mod config;
pub mod http;
pub mod latency;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use latency::{LatencySampler, LatencyShape};
pub use lifecycle::Shutdown;
pub use observability::{LogRecord, LogShipper};
