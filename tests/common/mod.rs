//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use animalbuttons_api::config::ServiceConfig;
use animalbuttons_api::http::{build_router, AppState};
use animalbuttons_api::latency::{FailureInjector, FixedClock, LatencySampler};
use animalbuttons_api::observability::{DeliveryFailure, FallbackSink, LogDocument};
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

/// Config with the slow parts of `/panda` switched off.
pub fn quick_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.latency.panda_max_steps = 0;
    config
}

/// Router whose sampler is frozen at `minute` and whose randomness is seeded.
pub fn router_at(minute: u32, failure_rate: f64, config: &ServiceConfig) -> Router {
    let state = AppState {
        sampler: Arc::new(LatencySampler::seeded(Arc::new(FixedClock::at_minute(minute)), 7)),
        failures: Arc::new(FailureInjector::seeded(failure_rate, 7)),
        latency: config.latency.clone(),
        metrics: None,
    };
    build_router(config, state)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();

    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn call(router: Router, method: &str, path: &str) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}

/// Fallback sink that remembers what it was told.
#[derive(Default)]
pub struct RecordingFallback {
    pub failures: Mutex<Vec<(LogDocument, String)>>,
    pub abandoned: Mutex<usize>,
}

impl RecordingFallback {
    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl FallbackSink for RecordingFallback {
    fn report(&self, failure: DeliveryFailure) {
        self.failures
            .lock()
            .unwrap()
            .push((failure.document, failure.error.to_string()));
    }

    fn abandoned(&self, count: usize) {
        *self.abandoned.lock().unwrap() += count;
    }
}
