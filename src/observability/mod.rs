//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events
//!         → console (fmt layer)
//!         → layer.rs → shipper.rs (document index, or local file)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → OpenSearch index (when enabled)
//!     → /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Log shipping is best-effort and never blocks a request
//! - Shipping failures go to stderr, never back through tracing
//! - Metrics are cheap (atomic increments)

pub mod layer;
pub mod logging;
pub mod metrics;
pub mod shipper;

pub use layer::ShipperLayer;
pub use shipper::{
    DeliveryError, DeliveryFailure, DocumentStore, DrainReport, FallbackSink, FileSink, LogDocument,
    LogLevel, LogRecord, LogShipper, OpenSearchStore, ShipperWorker, StderrFallback,
};
