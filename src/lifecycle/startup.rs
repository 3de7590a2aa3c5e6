//! Startup orchestration.
//!
//! Order: log shipper → global subscriber → shipper worker → metrics →
//! listener → serve. Any startup error is fatal. On shutdown the server
//! stops first, then the worker drains.

use std::future::Future;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServiceConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::logging::{self, LoggingError, SERVICE_TARGET};
use crate::observability::metrics;
use crate::observability::DrainReport;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("metrics setup failed: {0}")]
    Metrics(#[from] BuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the service until a shutdown signal arrives.
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    let (shipper, worker) = logging::build_shipper(&config)?;
    let indexing = shipper.is_indexing();
    logging::init_logging(&config, shipper)?;

    tracing::info!(
        target: SERVICE_TARGET,
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        shipping_to_index = indexing,
        "animalbuttons-api starting"
    );

    // The worker gets its own signal so it keeps shipping while the server
    // finishes in-flight requests.
    let shutdown = Shutdown::new();
    let worker_shutdown = Shutdown::new();

    let drain_timeout = Duration::from_secs(config.opensearch.drain_timeout_secs);
    let worker_task =
        worker.map(|worker| tokio::spawn(worker.run(worker_shutdown.subscribe(), drain_timeout)));

    let metrics_handle = if config.observability.metrics_enabled {
        Some(metrics::init_metrics(&config.observability.service_name)?)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(config, metrics_handle);
    let served = serve_then_drain(server.run(listener, server_shutdown), worker_task, &worker_shutdown).await;

    // Events past this point have no shipper to go to.
    served?;
    Ok(())
}

/// Await the server, then stop the shipper worker and wait for its drain.
///
/// Records logged while the server finishes its in-flight requests are
/// still delivered. Returns the server's own result.
pub async fn serve_then_drain<F: Future>(
    server: F,
    worker: Option<JoinHandle<DrainReport>>,
    worker_shutdown: &Shutdown,
) -> F::Output {
    let served = server.await;

    tracing::info!("Server stopped, draining log shipper");
    worker_shutdown.trigger();
    if let Some(task) = worker {
        match task.await {
            Ok(report) => logging::log_drain_report(&report),
            Err(e) => eprintln!("Log shipper worker failed: {e}"),
        }
    }

    served
}
