//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and the
//! OpenSearch endpoint. All errors are collected, not just the first.

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("latency.panda_failure_rate must be within [0, 1], got {0}")]
    FailureRateOutOfRange(f64),

    #[error("latency.panda_step_ms must be greater than zero when panda_max_steps is set")]
    ZeroPandaStep,

    #[error("opensearch.host '{host}' is not a valid http(s) URL: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("opensearch.index '{0}' must be non-empty and lowercase")]
    InvalidIndex(String),

    #[error("observability.log_file must not be empty")]
    EmptyLogFile,

    #[error("observability.{field} '{value}' is not a log level")]
    InvalidLogLevel { field: &'static str, value: String },
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let rate = config.latency.panda_failure_rate;
    if !(0.0..=1.0).contains(&rate) {
        errors.push(ValidationError::FailureRateOutOfRange(rate));
    }

    if config.latency.panda_max_steps > 0 && config.latency.panda_step_ms == 0 {
        errors.push(ValidationError::ZeroPandaStep);
    }

    let observability = &config.observability;
    if observability.log_file.trim().is_empty() {
        errors.push(ValidationError::EmptyLogFile);
    }
    for (field, value) in [
        ("log_level", &observability.log_level),
        ("shipped_level", &observability.shipped_level),
    ] {
        if value.parse::<LevelFilter>().is_err() {
            errors.push(ValidationError::InvalidLogLevel {
                field,
                value: value.clone(),
            });
        }
    }

    let opensearch = &config.opensearch;
    if opensearch.enabled {
        match Url::parse(&opensearch.host) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::InvalidHost {
                host: opensearch.host.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidHost {
                host: opensearch.host.clone(),
                reason: e.to_string(),
            }),
        }

        let index = &opensearch.index;
        if index.is_empty() || index.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push(ValidationError::InvalidIndex(index.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
