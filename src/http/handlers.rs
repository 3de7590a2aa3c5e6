//! Animal route handlers.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability;

pub const ANIMALS: [&str; 4] = ["snail", "rabbit", "panda", "beaver"];

#[derive(Debug, Serialize)]
pub struct AnimalList {
    pub animals: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct Suggestion {
    pub suggestion: &'static str,
}

impl Suggestion {
    fn new(suggestion: &'static str) -> Json<Self> {
        Json(Self { suggestion })
    }
}

pub async fn animals() -> Json<AnimalList> {
    Json(AnimalList { animals: &ANIMALS })
}

/// Snails are slow sometimes.
pub async fn snail(State(state): State<AppState>) -> Result<Json<Suggestion>, ApiError> {
    let delay = state.sampler.sample(i64::from(state.latency.snail_max_units))?;
    tracing::debug!(
        shape = delay.shape().as_str(),
        delay_secs = delay.as_secs_f64(),
        "Snail is taking its time"
    );
    tokio::time::sleep(delay.as_duration()).await;

    Ok(Suggestion::new("Let's take it easy"))
}

/// Rabbits are fast.
pub async fn rabbit() -> Json<Suggestion> {
    Suggestion::new("Let's drink coffee and go for a jog")
}

/// Pandas are clumsy, and slow when they do not trip.
pub async fn panda(State(state): State<AppState>) -> Result<Json<Suggestion>, ApiError> {
    state
        .failures
        .check("Panda")
        .inspect_err(|_| observability::metrics::record_injected_failure("/panda"))?;

    let step = Duration::from_millis(state.latency.panda_step_ms);
    let pause = state.sampler.stepped(state.latency.panda_max_steps, step);
    tokio::time::sleep(pause).await;

    Ok(Suggestion::new(
        "Let's eat bamboo. I think I found some over th--OH NO I tripped",
    ))
}

/// Beavers never error.
pub async fn beaver() -> Json<Suggestion> {
    Suggestion::new("Let's build a dam")
}

/// CORS preflight answer.
pub async fn preflight() -> &'static str {
    "OK"
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
