//! Response headers and error mapping.
//!
//! Errors keep the success status and carry a JSON `message` body plus the
//! CORS headers, so browser clients can always read them.

use axum::http::header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::latency::{InjectedFailure, LatencyError};
use crate::observability::logging::SERVICE_TARGET;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Body returned for every handler error.
pub const ERROR_MESSAGE: &str = "An error occurred.";

/// Handler errors are reported in the body, not the status line; failures
/// are counted by `injected_failures_total`.
pub const ERROR_STATUS: StatusCode = StatusCode::OK;

pub fn allow_origin_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN))
}

pub fn allow_headers_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS))
}

fn insert_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
}

/// Handler failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Injected(#[from] InjectedFailure),

    #[error(transparent)]
    Latency(#[from] LatencyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(target: SERVICE_TARGET, "An error occurred: {}", self);

        let mut response = (
            ERROR_STATUS,
            Json(json!({ "message": ERROR_MESSAGE })),
        )
            .into_response();
        insert_cors(response.headers_mut());
        response
    }
}
