//! Structured logging.
//!
//! # Responsibilities
//! - Build the log shipper from configuration (local file, plus the index
//!   when shipping is enabled)
//! - Install the global subscriber: console output plus the shipper layer
//!
//! # Design Decisions
//! - Console verbosity follows `RUST_LOG`, falling back to config
//! - Only the service's own targets are shipped; the observability module
//!   itself is excluded so shipping failures can never feed back into the
//!   shipper

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::Layer;

use crate::config::ServiceConfig;
use crate::observability::layer::ShipperLayer;
use crate::observability::shipper::{
    DeliveryError, DrainReport, FallbackSink, FileSink, LogShipper, OpenSearchStore, ShipperWorker, StderrFallback,
};

/// Logger name for service-level events, matching the shipped index's
/// `logger` field.
pub const SERVICE_TARGET: &str = "animalbuttons";

const QUIET_TARGET: &str = "animalbuttons_api::observability";

/// Errors raised while setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("cannot open log file '{path}': {source}")]
    LogFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot build OpenSearch client: {0}")]
    Store(#[from] DeliveryError),

    #[error("global subscriber already installed: {0}")]
    Init(#[from] TryInitError),
}

/// Build the shipper for this configuration. Every record is appended to
/// the local log file; with shipping enabled it also goes to the index, and
/// the returned worker must be spawned by the caller.
pub fn build_shipper(config: &ServiceConfig) -> Result<(LogShipper, Option<ShipperWorker>), LoggingError> {
    let fallback: Arc<dyn FallbackSink> = Arc::new(StderrFallback);
    let opensearch = &config.opensearch;
    let sink = open_log_file(&config.observability.log_file)?;

    if opensearch.enabled {
        let store = OpenSearchStore::new(
            &opensearch.host,
            Duration::from_secs(opensearch.request_timeout_secs),
        )?;
        let (shipper, worker) = LogShipper::to_index(Arc::new(store), opensearch.index.clone(), fallback);
        Ok((shipper.with_file(sink), Some(worker)))
    } else {
        Ok((LogShipper::to_file(sink, fallback), None))
    }
}

fn open_log_file(path: &str) -> Result<FileSink, LoggingError> {
    FileSink::open(path).map_err(|source| LoggingError::LogFile {
        path: path.to_string(),
        source,
    })
}

/// Filter deciding which events reach the shipper.
pub fn shipped_targets(level: LevelFilter) -> Targets {
    Targets::new()
        .with_target(SERVICE_TARGET, level)
        .with_target(QUIET_TARGET, LevelFilter::OFF)
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

/// Install the global subscriber.
pub fn init_logging(config: &ServiceConfig, shipper: LogShipper) -> Result<(), LoggingError> {
    let console_level = parse_level(&config.observability.log_level)?;
    let shipped_level = parse_level(&config.observability.shipped_level)?;

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{SERVICE_TARGET}={console_level},tower_http={console_level}"
        ))
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(console_filter))
        .with(ShipperLayer::new(shipper).with_filter(shipped_targets(shipped_level)))
        .try_init()?;

    Ok(())
}

/// Log the outcome of a shipper drain. Emitted from this module so it
/// stays on the console and is not handed to the closed shipper.
pub fn log_drain_report(report: &DrainReport) {
    if report.abandoned > 0 {
        tracing::warn!(
            dispatched = report.dispatched,
            abandoned = report.abandoned,
            "Log shipper stopped with deliveries in flight"
        );
    } else {
        tracing::info!(dispatched = report.dispatched, "Log shipper drained");
    }
}
