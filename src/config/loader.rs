//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}")]
    Env { key: &'static str, value: String },

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

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    normalize_empty(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment-style key/value pairs onto `config`.
///
/// `lookup` abstracts the environment so callers can supply a fixed map.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("HOST") {
        config.listener.hostname = host;
    }
    if let Some(port) = lookup("PORT") {
        config.listener.port = parse_env("PORT", port)?;
    }

    if let Some(window) = lookup("RATE_LIMIT_WINDOW_MS") {
        config.admission.window_ms = parse_env("RATE_LIMIT_WINDOW_MS", window)?;
    }
    if let Some(max) = lookup("RATE_LIMIT_MAX") {
        config.admission.max_requests = parse_env("RATE_LIMIT_MAX", max)?;
    }
    if let Some(key) = lookup("API_KEY") {
        // An empty key means open access.
        config.admission.api_key = Some(key).filter(|k| !k.is_empty());
    }
    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.admission.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(url) = lookup("RENDERER_URL") {
        config.backends.renderer_url = url;
    }
    if let Some(url) = lookup("TASK_API_URL") {
        config.backends.task_api_url = url;
    }
    if let Some(url) = lookup("DESKTOP_STREAM_URL") {
        config.backends.desktop_stream_url = url;
    }
    if let Some(url) = lookup("LOCAL_DESKTOP_URL") {
        config.backends.local_desktop_url = Some(url).filter(|u| !u.is_empty());
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => return Err(ConfigError::Env { key: "LOG_FORMAT", value: format }),
        };
    }
    if let Some(addr) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(addr).filter(|a| !a.is_empty());
    }

    Ok(())
}

/// Treat empty optional strings as unset, wherever they came from.
///
/// An empty `api_key` means open access, so it must not read as configured.
pub fn normalize_empty(config: &mut GatewayConfig) {
    fn clear(value: &mut Option<String>) {
        if value.as_deref().is_some_and(str::is_empty) {
            *value = None;
        }
    }
    clear(&mut config.admission.api_key);
    clear(&mut config.backends.local_desktop_url);
    clear(&mut config.observability.metrics_address);
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}
