//! Log shipping against a mock OpenSearch node.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use animalbuttons_api::config::ServiceConfig;
use animalbuttons_api::lifecycle::startup::serve_then_drain;
use animalbuttons_api::lifecycle::Shutdown;
use animalbuttons_api::observability::logging::{build_shipper, shipped_targets};
use animalbuttons_api::observability::{
    LogLevel, LogRecord, LogShipper, OpenSearchStore, ShipperLayer, ShipperWorker,
};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

mod common;
use common::RecordingFallback;

const INDEX: &str = "animalbuttons-logs-v3";

fn index_shipper(host: &str, fallback: Arc<RecordingFallback>) -> (LogShipper, ShipperWorker) {
    let store = OpenSearchStore::new(host, Duration::from_secs(5)).unwrap();
    LogShipper::to_index(Arc::new(store), INDEX, fallback)
}

#[tokio::test]
async fn test_record_indexed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_doc")))
        .and(body_partial_json(json!({
            "message": "An error occurred: boom",
            "logger": "animalbuttons",
            "level": "ERROR",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
        .expect(1)
        .mount(&server)
        .await;

    let fallback = Arc::new(RecordingFallback::default());
    let (shipper, worker) = index_shipper(&server.uri(), fallback.clone());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(worker.run(shutdown.subscribe(), Duration::from_secs(5)));

    shipper.submit(LogRecord::new(LogLevel::Error, "animalbuttons", "An error occurred: boom"));
    drop(shipper);

    let report = task.await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.abandoned, 0);
    assert_eq!(fallback.failure_count(), 0);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let timestamp = body["@timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_submit_not_slowed_by_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fallback = Arc::new(RecordingFallback::default());
    let (shipper, worker) = index_shipper(&server.uri(), fallback.clone());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(worker.run(shutdown.subscribe(), Duration::from_millis(100)));

    let start = Instant::now();
    for i in 0..100 {
        shipper.submit(LogRecord::new(LogLevel::Info, "animalbuttons", format!("record {i}")));
    }
    assert!(start.elapsed() < Duration::from_millis(50), "submit blocked for {:?}", start.elapsed());

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();

    let report = task.await.unwrap();
    assert_eq!(report.dispatched, 100);
    assert_eq!(report.abandoned, 100);
    assert_eq!(*fallback.abandoned.lock().unwrap(), 100);
}

#[tokio::test]
async fn test_rejection_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("cluster_block_exception"))
        .expect(1)
        .mount(&server)
        .await;

    let fallback = Arc::new(RecordingFallback::default());
    let (shipper, worker) = index_shipper(&server.uri(), fallback.clone());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(worker.run(shutdown.subscribe(), Duration::from_secs(5)));

    shipper.submit(LogRecord::new(LogLevel::Warn, "animalbuttons", "rejected"));
    drop(shipper);
    task.await.unwrap();

    let failures = fallback.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.message, "rejected");
    assert_eq!(failures[0].0.level, LogLevel::Warn);
    assert!(failures[0].1.contains("500"));
    assert!(failures[0].1.contains("cluster_block_exception"));
}

#[tokio::test]
async fn test_unreachable_store_reported_once() {
    // Bind then drop to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

    let fallback = Arc::new(RecordingFallback::default());
    let (shipper, worker) = index_shipper(&format!("http://127.0.0.1:{port}"), fallback.clone());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(worker.run(shutdown.subscribe(), Duration::from_secs(5)));

    shipper.submit(LogRecord::new(LogLevel::Error, "animalbuttons", "nobody home"));
    drop(shipper);
    task.await.unwrap();

    let failures = fallback.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.starts_with("transport error"));
}

#[tokio::test]
async fn test_disabled_shipping_writes_file_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("animalbuttons.log");
    let mut config = ServiceConfig::default();
    config.opensearch.enabled = false;
    config.opensearch.host = server.uri();
    config.observability.log_file = log_file.display().to_string();

    let (shipper, worker) = build_shipper(&config).unwrap();
    assert!(worker.is_none());

    shipper.submit(LogRecord::new(LogLevel::Error, "animalbuttons", "kept locally"));

    let contents = std::fs::read_to_string(&log_file).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains(" - animalbuttons - ERROR - kept locally"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_panda_failure_shipped_without_changing_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_doc")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fallback = Arc::new(RecordingFallback::default());
    let (shipper, worker) = index_shipper(&server.uri(), fallback.clone());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(worker.run(shutdown.subscribe(), Duration::from_secs(5)));

    let subscriber = tracing_subscriber::registry()
        .with(ShipperLayer::new(shipper).with_filter(shipped_targets(LevelFilter::INFO)));
    let guard = tracing::subscriber::set_default(subscriber);

    let router = common::router_at(0, 1.0, &common::quick_config());
    let res = common::call(router, "GET", "/panda").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "message": "An error occurred." }));

    drop(guard);
    shutdown.trigger();
    task.await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let shipped: Vec<Value> = requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    let error = shipped
        .iter()
        .find(|doc| doc["level"] == "ERROR")
        .expect("error record shipped");
    assert_eq!(error["logger"], "animalbuttons");
    assert_eq!(error["message"], "An error occurred: Panda service error occurred!");

    // Every document was rejected, and each rejection surfaced exactly once.
    assert_eq!(fallback.failure_count(), requests.len());
}

#[tokio::test]
async fn test_enabled_shipping_keeps_local_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_doc")))
        .and(body_partial_json(json!({ "message": "kept twice", "level": "INFO" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("animalbuttons.log");
    let mut config = ServiceConfig::default();
    config.opensearch.enabled = true;
    config.opensearch.host = server.uri();
    config.observability.log_file = log_file.display().to_string();

    let (shipper, worker) = build_shipper(&config).unwrap();
    assert!(shipper.is_indexing());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(worker.unwrap().run(shutdown.subscribe(), Duration::from_secs(5)));

    shipper.submit(LogRecord::new(LogLevel::Info, "animalbuttons", "kept twice"));

    let contents = std::fs::read_to_string(&log_file).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains(" - animalbuttons - INFO - kept twice"));

    drop(shipper);
    let report = task.await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_during_server_drain_is_still_shipped() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_doc")))
        .and(body_partial_json(json!({ "message": "An error occurred: Panda service error occurred!" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock)
        .await;

    let fallback = Arc::new(RecordingFallback::default());
    let (shipper, worker) = index_shipper(&mock.uri(), fallback.clone());
    let server_shutdown = Shutdown::new();
    let worker_shutdown = Shutdown::new();
    let task = tokio::spawn(worker.run(worker_shutdown.subscribe(), Duration::from_secs(5)));

    // Stands in for a server that finishes one failing request after the signal.
    let mut server_rx = server_shutdown.subscribe();
    let late = shipper.clone();
    let server = async move {
        let _ = server_rx.recv().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        late.submit(LogRecord::new(
            LogLevel::Error,
            "animalbuttons",
            "An error occurred: Panda service error occurred!",
        ));
        "served"
    };

    server_shutdown.trigger();
    assert!(!worker_shutdown.is_triggered());

    let served = serve_then_drain(server, Some(task), &worker_shutdown).await;
    assert_eq!(served, "served");
    assert!(worker_shutdown.is_triggered());
    assert_eq!(fallback.failure_count(), 0);
    assert_eq!(mock.received_requests().await.unwrap().len(), 1);
}

