//! Route behavior driven through the full middleware stack.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;

use animalbuttons_api::http::response::{ALLOW_HEADERS, ALLOW_ORIGIN};
use animalbuttons_api::http::{build_router, AppState};

mod common;

#[tokio::test]
async fn test_lists_animals() {
    let res = common::call(common::router_at(0, 0.0, &common::quick_config()), "GET", "/").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "animals": ["snail", "rabbit", "panda", "beaver"] }));
}

#[tokio::test]
async fn test_beaver_never_errors() {
    let router = common::router_at(0, 1.0, &common::quick_config());
    for _ in 0..5 {
        let res = common::call(router.clone(), "GET", "/beaver").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json(), json!({ "suggestion": "Let's build a dam" }));
    }
}

#[tokio::test]
async fn test_rabbit_carries_cors_headers() {
    let router = common::router_at(0, 0.0, &common::quick_config());

    let res = common::call(router.clone(), "GET", "/rabbit").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["suggestion"], "Let's drink coffee and go for a jog");
    assert_eq!(res.headers["access-control-allow-origin"], ALLOW_ORIGIN);
    assert_eq!(res.headers["access-control-allow-headers"], ALLOW_HEADERS);

    let res = common::call(router, "OPTIONS", "/rabbit").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "OK");
    assert_eq!(res.headers["access-control-allow-origin"], ALLOW_ORIGIN);
}

#[tokio::test]
async fn test_clumsy_panda_reports_error() {
    let router = common::router_at(0, 1.0, &common::quick_config());

    let res = common::call(router, "GET", "/panda").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "message": "An error occurred." }));
    assert_eq!(res.headers["access-control-allow-origin"], ALLOW_ORIGIN);
    assert_eq!(res.headers["access-control-allow-headers"], ALLOW_HEADERS);
}

#[tokio::test]
async fn test_steady_panda_suggests_bamboo() {
    let router = common::router_at(0, 0.0, &common::quick_config());

    let res = common::call(router.clone(), "GET", "/panda").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json()["suggestion"].as_str().unwrap().starts_with("Let's eat bamboo"));

    let res = common::call(router, "OPTIONS", "/panda").await;
    assert_eq!(res.body, "OK");
    assert_eq!(res.headers["access-control-allow-headers"], ALLOW_HEADERS);
}

#[tokio::test]
async fn test_panda_pause_is_bounded() {
    let mut config = common::quick_config();
    config.latency.panda_max_steps = 3;
    config.latency.panda_step_ms = 10;
    let router = common::router_at(0, 0.0, &config);

    let start = Instant::now();
    let res = common::call(router, "GET", "/panda").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_snail_waits_within_budget() {
    let config = common::quick_config();
    for minute in [1, 4, 8] {
        let router = common::router_at(minute, 0.0, &config);
        let start = Instant::now();
        let res = common::call(router, "GET", "/snail").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json(), json!({ "suggestion": "Let's take it easy" }));
        // 11 units = 110ms budget, plus generous scheduling slack.
        assert!(start.elapsed() < Duration::from_millis(600), "minute {minute}");
    }
}

#[tokio::test]
async fn test_snail_with_zero_budget_is_immediate() {
    let mut config = common::quick_config();
    config.latency.snail_max_units = 0;
    let router = common::router_at(2, 0.0, &config);

    let start = Instant::now();
    let res = common::call(router, "GET", "/snail").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn test_request_id_generated_and_preserved() {
    let router = common::router_at(0, 0.0, &common::quick_config());

    let res = common::call(router.clone(), "GET", "/beaver").await;
    let generated = res.headers["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let request = Request::builder()
        .uri("/beaver")
        .header("x-request-id", "trace-me-42")
        .body(Body::empty())
        .unwrap();
    let res = common::send(router, request).await;
    assert_eq!(res.headers["x-request-id"], "trace-me-42");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let res = common::call(common::router_at(0, 0.0, &common::quick_config()), "GET", "/giraffe").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let config = common::quick_config();

    let res = common::call(common::router_at(0, 0.0, &config), "GET", "/metrics").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let recorder = PrometheusBuilder::new().build_recorder();
    let state = AppState {
        metrics: Some(recorder.handle()),
        ..AppState::from_config(&config, None)
    };
    let res = common::call(build_router(&config, state), "GET", "/metrics").await;
    assert_eq!(res.status, StatusCode::OK);
}
