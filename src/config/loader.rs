//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the OpenSearch base URL.
pub const ENV_OPENSEARCH_HOST: &str = "OPENSEARCH_HOST";
/// Environment variable enabling index shipping when set to `"true"`.
pub const ENV_OPENSEARCH_ENABLED: &str = "OPENSEARCH_LOGGING_ENABLED";
/// Environment variable overriding the listener bind address.
pub const ENV_BIND_ADDRESS: &str = "ANIMALBUTTONS_BIND";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides using `lookup` to resolve variables.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_OPENSEARCH_HOST) {
        config.opensearch.host = host;
    }
    if let Some(enabled) = lookup(ENV_OPENSEARCH_ENABLED) {
        config.opensearch.enabled = enabled == "true";
    }
    if let Some(bind) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = bind;
    }
}

/// Build the effective configuration: file (or defaults), then process
/// environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
