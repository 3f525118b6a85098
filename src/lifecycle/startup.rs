//! Startup reporting.
//!
//! # Responsibilities
//! - Log the effective configuration once, secrets excluded
//! - Warn when the built-in shared password is still in use

use secrecy::ExposeSecret;

use crate::config::schema::FALLBACK_PASSWORD;
use crate::config::ProxyConfig;

/// Log the settings the proxy is about to run with.
pub fn log_configuration(config: &ProxyConfig) {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_url,
        login_path = %config.auth.login_path,
        completion_path = %config.auth.completion_path,
        cookie_secure = ?config.auth.cookie_secure,
        websocket_origin = config.websocket.origin.as_deref().unwrap_or("<backend origin>"),
        cors_origins = config.cors.allowed_origins.len(),
        metrics_enabled = config.observability.metrics_enabled,
        "Configuration loaded"
    );

    if uses_fallback_password(config) {
        tracing::warn!("Using the built-in default password; make sure it matches the backend's user setup");
    }
}

pub fn uses_fallback_password(config: &ProxyConfig) -> bool {
    let password = config.auth.default_password.expose_secret();
    password.is_empty() || password == FALLBACK_PASSWORD
}
