//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the animal buttons API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Synthetic latency and failure injection.
    pub latency: LatencyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Log shipping to the OpenSearch document index.
    pub opensearch: OpenSearchConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Latency and failure injection for the animal routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Latency budget for `/snail`, in 10ms units.
    pub snail_max_units: u32,

    /// Probability in `[0, 1]` that `/panda` trips.
    pub panda_failure_rate: f64,

    /// Upper bound on the number of pause steps `/panda` takes.
    pub panda_max_steps: u32,

    /// Length of a single `/panda` pause step in milliseconds.
    pub panda_step_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            snail_max_units: 11,
            panda_failure_rate: 0.5,
            panda_max_steps: 11,
            panda_step_ms: 150,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Console log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Minimum level of events handed to the log shipper.
    pub shipped_level: String,

    /// Local log file used when index shipping is disabled.
    pub log_file: String,

    /// Service name reported in `build_info`.
    pub service_name: String,

    /// Expose `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            shipped_level: "info".to_string(),
            log_file: "animalbuttons.log".to_string(),
            service_name: "animalbuttons-api".to_string(),
            metrics_enabled: true,
        }
    }
}

/// OpenSearch log shipping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenSearchConfig {
    /// Ship log records to the index. When false, records go to the log file.
    pub enabled: bool,

    /// Base URL of the OpenSearch node.
    pub host: String,

    /// Target index name.
    pub index: String,

    /// Per-request timeout for index calls in seconds.
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight deliveries, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "http://localhost:9200".to_string(),
            index: "animalbuttons-logs-v3".to_string(),
            request_timeout_secs: 5,
            drain_timeout_secs: 5,
        }
    }
}
