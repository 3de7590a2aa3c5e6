//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, CORS headers)
//! - Record per-route request metrics
//! - Bind server to listener and stop on the shutdown broadcast

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{LatencyConfig, ServiceConfig};
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::{allow_headers_layer, allow_origin_layer};
use crate::latency::{Clock, FailureInjector, LatencySampler, SystemClock};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub sampler: Arc<LatencySampler>,
    pub failures: Arc<FailureInjector>,
    pub latency: LatencyConfig,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State backed by the system clock and entropy-seeded randomness.
    pub fn from_config(config: &ServiceConfig, metrics: Option<PrometheusHandle>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            sampler: Arc::new(LatencySampler::new(clock)),
            failures: Arc::new(FailureInjector::new(config.latency.panda_failure_rate)),
            latency: config.latency.clone(),
            metrics,
        }
    }
}

/// HTTP server for the animal API.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig, metrics: Option<PrometheusHandle>) -> Self {
        let state = AppState::from_config(&config, metrics);
        Self::with_state(config, state)
    }

    /// Create a server around prepared state (fixed clocks, seeded sources).
    pub fn with_state(config: ServiceConfig, state: AppState) -> Self {
        let router = build_router(&config, state);
        Self { router, config }
    }

    /// A clone of the router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
    let cors_routes = Router::new()
        .route("/rabbit", get(handlers::rabbit).options(handlers::preflight))
        .route("/panda", get(handlers::panda).options(handlers::preflight))
        .layer(allow_origin_layer())
        .layer(allow_headers_layer());

    Router::new()
        .route("/", get(handlers::animals))
        .route("/snail", get(handlers::snail))
        .route("/beaver", get(handlers::beaver))
        .merge(cors_routes)
        .route_layer(middleware::from_fn(track_metrics))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

/// Per-route request counter and latency histogram.
async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().to_string();
    let request_id = request.request_id().unwrap_or("unknown").to_string();

    let response = next.run(request).await;
    let status = response.status();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        route = %route,
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request handled"
    );
    metrics::record_request(&route, &method, status.as_u16(), start);

    response
}
