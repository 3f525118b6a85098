//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use secrecy::SecretString;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

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

/// Load and validate configuration.
///
/// Starts from the TOML file when one is given (defaults otherwise), then
/// applies environment overrides, then validates the result.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so the mapping can be exercised without
/// touching process state.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = var("PLANKA_URL") {
        config.backend.base_url = url.trim().to_string();
    }
    if let Some(password) = lookup("PLANKA_DEFAULT_USER_PASSWORD").filter(|v| !v.is_empty()) {
        config.auth.default_password = SecretString::from(password);
    }
    if let Some(address) = var("PROXY_BIND_ADDRESS") {
        config.listener.bind_address = address.trim().to_string();
    }
    if let Some(port) = var("PROXY_PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "PROXY_PORT",
            message: format!("'{}' is not a port number", port),
        })?;
        config.listener.bind_address = with_port(&config.listener.bind_address, port);
    }
    if let Some(origins) = var("PROXY_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(origin) = var("PLANKA_WS_ORIGIN") {
        config.websocket.origin = Some(origin.trim().to_string());
    }
    if let Some(secure) = var("PROXY_COOKIE_SECURE") {
        config.auth.cookie_secure = Some(parse_bool(&secure).ok_or_else(|| ConfigError::Env {
            var: "PROXY_COOKIE_SECURE",
            message: format!("'{}' is not a boolean", secure),
        })?);
    }
    if let Some(format) = var("PROXY_LOG_FORMAT") {
        config.observability.log_format = format
            .parse()
            .map_err(|message| ConfigError::Env { var: "PROXY_LOG_FORMAT", message })?;
    }
    if let Some(address) = var("PROXY_METRICS_ADDRESS") {
        config.observability.metrics_address = address.trim().to_string();
        config.observability.metrics_enabled = true;
    }

    Ok(())
}

/// Replace the port of a `host:port` bind address, keeping the host.
fn with_port(bind_address: &str, port: u16) -> String {
    let host = match bind_address.rsplit_once(':') {
        Some((host, _)) if !host.is_empty() => host,
        _ => "0.0.0.0",
    };
    format!("{}:{}", host, port)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
