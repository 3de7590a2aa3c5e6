//! Asynchronous log shipping to a document index.
//!
//! # Data Flow
//! ```text
//! LogShipper::submit (sync, never waits on the network)
//!     → FileSink (append one line, when a local copy is kept)
//!     → LogDocument (index shape)
//!     → unbounded channel
//!     → ShipperWorker (background task)
//!         → one DocumentStore::index call per document, concurrently
//!         → on failure: FallbackSink::report
//!
//! Index shipping disabled:
//! LogShipper::submit → FileSink only
//! ```
//!
//! # Delivery Semantics
//! - At most one attempt per record; no retry, no persistence
//! - Deliveries may complete in any order
//! - Every failure reaches the fallback sink, nothing is dropped silently
//! - On shutdown the worker drains the queue and waits a bounded time for
//!   in-flight deliveries; the rest are aborted and counted as abandoned

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use crate::observability::metrics;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// A structured log record. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    message: String,
    logger_name: String,
    level: LogLevel,
    timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// A record stamped with the current time.
    pub fn new(level: LogLevel, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at(Utc::now(), level, logger_name, message)
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        level: LogLevel,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            logger_name: logger_name.into(),
            level,
            timestamp,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Single-line form used by the file sink.
    pub fn formatted(&self) -> String {
        format!(
            "{} - {} - {} - {}",
            iso_timestamp(self.timestamp),
            self.logger_name,
            self.level,
            self.message
        )
    }
}

fn iso_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// A log record in the shape the document index stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDocument {
    pub message: String,
    pub logger: String,
    pub level: LogLevel,
    /// ISO-8601 string so the index maps it as a date, not a float.
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
}

impl From<&LogRecord> for LogDocument {
    fn from(record: &LogRecord) -> Self {
        Self {
            message: record.message.clone(),
            logger: record.logger_name.clone(),
            level: record.level,
            timestamp: iso_timestamp(record.timestamp),
        }
    }
}

/// Why a record could not be shipped.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The index could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The index answered with a non-success status.
    #[error("index rejected document with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Appending to the local log file failed.
    #[error("local sink error: {0}")]
    LocalSink(#[from] io::Error),

    /// The background worker is no longer accepting records.
    #[error("shipper is closed")]
    Closed,
}

/// An external store accepting one document per call.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index(&self, index: &str, document: &LogDocument) -> Result<(), DeliveryError>;
}

/// OpenSearch `_doc` endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct OpenSearchStore {
    client: reqwest::Client,
    base_url: String,
}

impl OpenSearchStore {
    pub fn new(host: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: host.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn index(&self, index: &str, document: &LogDocument) -> Result<(), DeliveryError> {
        let url = format!("{}/{}/_doc", self.base_url, index);
        let response = self
            .client
            .post(url)
            .json(document)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// A record that could not be shipped, with the reason.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub document: LogDocument,
    pub error: DeliveryError,
}

/// Where shipping failures are reported. Must not log through the shipper.
pub trait FallbackSink: Send + Sync {
    fn report(&self, failure: DeliveryFailure);

    /// In-flight deliveries aborted at shutdown.
    fn abandoned(&self, count: usize);
}

/// Reports failures on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrFallback;

impl StderrFallback {
    /// The line written for one failed record.
    pub fn describe(failure: &DeliveryFailure) -> String {
        let DeliveryFailure { document, error } = failure;
        let prefix = match error {
            DeliveryError::LocalSink(_) => "Failed to write log to local sink",
            _ => "Failed to send log to OpenSearch",
        };
        format!("{prefix}: {error} ({}: {})", document.level, document.message)
    }

    pub fn describe_abandoned(count: usize) -> String {
        format!("Abandoned {count} in-flight log deliveries at shutdown")
    }
}

impl FallbackSink for StderrFallback {
    fn report(&self, failure: DeliveryFailure) {
        eprintln!("{}", Self::describe(&failure));
    }

    fn abandoned(&self, count: usize) {
        eprintln!("{}", Self::describe_abandoned(count));
    }
}

/// Appends formatted records to a local file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &LogRecord) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{}", record.formatted())
    }
}

struct Route {
    index: Option<mpsc::UnboundedSender<LogDocument>>,
    file: Option<FileSink>,
}

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct LogShipper {
    route: Arc<Route>,
    fallback: Arc<dyn FallbackSink>,
}

impl fmt::Debug for LogShipper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogShipper")
            .field("indexing", &self.is_indexing())
            .field("file", &self.route.file.as_ref().map(FileSink::path))
            .finish()
    }
}

impl LogShipper {
    /// Ship to a document index. The returned worker must be run for
    /// anything to be delivered.
    pub fn to_index(
        store: Arc<dyn DocumentStore>,
        index: impl Into<String>,
        fallback: Arc<dyn FallbackSink>,
    ) -> (Self, ShipperWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = ShipperWorker {
            rx,
            store,
            index: Arc::from(index.into()),
            fallback: Arc::clone(&fallback),
        };
        let shipper = Self {
            route: Arc::new(Route {
                index: Some(tx),
                file: None,
            }),
            fallback,
        };
        (shipper, worker)
    }

    /// Write records to a local file only; no network involved.
    pub fn to_file(sink: FileSink, fallback: Arc<dyn FallbackSink>) -> Self {
        Self {
            route: Arc::new(Route {
                index: None,
                file: Some(sink),
            }),
            fallback,
        }
    }

    /// Also keep a local copy of every record in `sink`.
    pub fn with_file(self, sink: FileSink) -> Self {
        Self {
            route: Arc::new(Route {
                index: self.route.index.clone(),
                file: Some(sink),
            }),
            fallback: self.fallback,
        }
    }

    pub fn is_indexing(&self) -> bool {
        self.route.index.is_some()
    }

    /// Hand a record over for delivery. Index delivery happens on the
    /// worker; the local file append is synchronous I/O on the caller's
    /// thread.
    pub fn submit(&self, record: LogRecord) {
        if let Some(sink) = &self.route.file {
            if let Err(e) = sink.append(&record) {
                self.fallback.report(DeliveryFailure {
                    document: LogDocument::from(&record),
                    error: DeliveryError::LocalSink(e),
                });
            }
        }

        if let Some(tx) = &self.route.index {
            if let Err(mpsc::error::SendError(document)) = tx.send(LogDocument::from(&record)) {
                self.fallback.report(DeliveryFailure {
                    document,
                    error: DeliveryError::Closed,
                });
            }
        }
    }
}

/// Outcome of a worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Documents handed to the store.
    pub dispatched: usize,
    /// Deliveries still running when the drain deadline passed.
    pub abandoned: usize,
}

/// Background consumer of the shipper queue.
pub struct ShipperWorker {
    rx: mpsc::UnboundedReceiver<LogDocument>,
    store: Arc<dyn DocumentStore>,
    index: Arc<str>,
    fallback: Arc<dyn FallbackSink>,
}

impl fmt::Debug for ShipperWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShipperWorker")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl ShipperWorker {
    /// Deliver until shutdown (or until every producer is gone), then drain.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>, drain_timeout: Duration) -> DrainReport {
        let ShipperWorker {
            mut rx,
            store,
            index,
            fallback,
        } = self;
        let mut in_flight = JoinSet::new();
        let mut report = DrainReport::default();

        loop {
            tokio::select! {
                document = rx.recv() => match document {
                    Some(document) => {
                        spawn_delivery(&mut in_flight, &store, &index, &fallback, document);
                        report.dispatched += 1;
                    }
                    None => break,
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                _ = shutdown.recv() => break,
            }
        }

        // Stop accepting, then flush what was already queued.
        rx.close();
        while let Ok(document) = rx.try_recv() {
            spawn_delivery(&mut in_flight, &store, &index, &fallback, document);
            report.dispatched += 1;
        }

        let drained = tokio::time::timeout(drain_timeout, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            report.abandoned = in_flight.len();
            in_flight.abort_all();
            fallback.abandoned(report.abandoned);
        }

        report
    }
}

fn spawn_delivery(
    in_flight: &mut JoinSet<()>,
    store: &Arc<dyn DocumentStore>,
    index: &Arc<str>,
    fallback: &Arc<dyn FallbackSink>,
    document: LogDocument,
) {
    let store = Arc::clone(store);
    let index = Arc::clone(index);
    let fallback = Arc::clone(fallback);

    in_flight.spawn(async move {
        match store.index(&index, &document).await {
            Ok(()) => metrics::record_log_delivery("delivered"),
            Err(error) => {
                metrics::record_log_delivery("failed");
                fallback.report(DeliveryFailure { document, error });
            }
        }
    });
}
