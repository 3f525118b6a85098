//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject backend URLs the forwarder cannot reach
//! - Insist on an explicit cookie `Secure` policy
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::backend::BackendTarget;
use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Err(e) = BackendTarget::parse(&config.backend.base_url) {
        errors.push(ValidationError::new("backend.base_url", e.to_string()));
    }

    if !config.backend.login_path.starts_with('/') {
        errors.push(ValidationError::new("backend.login_path", "must start with '/'"));
    }

    if config.backend.login_timeout_secs == 0 {
        errors.push(ValidationError::new("backend.login_timeout_secs", "must be greater than zero"));
    }

    let auth = &config.auth;
    for (field, path) in [
        ("auth.login_path", &auth.login_path),
        ("auth.completion_path", &auth.completion_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
        if path.as_str() == "/health" {
            errors.push(ValidationError::new(field, "collides with the health endpoint"));
        }
        if !is_literal_route(path) {
            errors.push(ValidationError::new(
                field,
                format!("'{}' must be a literal path without '{{', '}}', ':' or '*' segments", path),
            ));
        }
    }
    if auth.login_path == auth.completion_path {
        errors.push(ValidationError::new(
            "auth.completion_path",
            "must differ from auth.login_path",
        ));
    }
    if auth.post_login_redirect.is_empty() {
        errors.push(ValidationError::new("auth.post_login_redirect", "must not be empty"));
    } else if HeaderValue::from_str(&auth.post_login_redirect).is_err() {
        errors.push(ValidationError::new(
            "auth.post_login_redirect",
            "must be usable as a Location header value",
        ));
    }
    if auth.cookie_secure.is_none() {
        errors.push(ValidationError::new(
            "auth.cookie_secure",
            "must be set explicitly (true behind TLS, false for plain HTTP)",
        ));
    }

    if let Some(origin) = &config.websocket.origin {
        if HeaderValue::from_str(origin).is_err() || url::Url::parse(origin).is_err() {
            errors.push(ValidationError::new(
                "websocket.origin",
                format!("'{}' is not a valid origin", origin),
            ));
        }
    }

    for origin in &config.cors.allowed_origins {
        if HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not a valid header value", origin),
            ));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than zero"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Route paths are matched literally; the router treats braces and
/// `:`/`*`-prefixed segments as captures.
fn is_literal_route(path: &str) -> bool {
    !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.auth.cookie_secure = Some(false);
        config
    }

    #[test]
    fn accepts_defaults_once_cookie_policy_is_set() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn requires_cookie_policy() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "auth.cookie_secure");
    }

    #[test]
    fn reports_every_problem() {
        let mut config = valid_config();
        config.listener.bind_address = "not-an-address".into();
        config.backend.base_url = "ftp://planka".into();
        config.timeouts.request_secs = 0;
        config.auth.completion_path = config.auth.login_path.clone();

        let fields: Vec<_> = validate_config(&config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();

        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"backend.base_url"));
        assert!(fields.contains(&"timeouts.request_secs"));
        assert!(fields.contains(&"auth.completion_path"));
    }

    #[test]
    fn rejects_garbage_websocket_origin() {
        let mut config = valid_config();
        config.websocket.origin = Some("planka\nzackywacky".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "websocket.origin");
    }

    #[test]
    fn rejects_bridge_paths_with_route_captures() {
        for path in ["/login/{id}", "/login}", "/:login", "/planka/*rest"] {
            let mut config = valid_config();
            config.auth.login_path = path.to_string();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1, "{}", path);
            assert_eq!(errors[0].field, "auth.login_path");
        }

        let mut config = valid_config();
        config.auth.completion_path = "/auth/complete-login".into();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn rejects_redirect_unusable_as_location() {
        let mut config = valid_config();
        config.auth.post_login_redirect = "/boards\r\nSet-Cookie: x=1".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "auth.post_login_redirect");
    }
}
