//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Shared password Planka ships with; used only when nothing else is configured.
pub const FALLBACK_PASSWORD: &str = "P@55w0rd";

/// Root configuration for the auth proxy.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single backend application being fronted.
    pub backend: BackendConfig,

    /// Login bridge settings.
    pub auth: AuthConfig,

    /// WebSocket handshake rewriting.
    pub websocket: WebSocketConfig,

    /// Browser origins allowed to call the proxy with credentials.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// Backend application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g., "http://planka:1337").
    pub base_url: String,

    /// Token-issuing endpoint, relative to `base_url`.
    pub login_path: String,

    /// Upper bound on a single backend login call, in seconds.
    pub login_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            login_path: "/api/access-tokens".to_string(),
            login_timeout_secs: 10,
        }
    }
}

/// Credential bridge configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared password used for every login performed on behalf of a client.
    pub default_password: SecretString,

    /// Path of the login trigger endpoint.
    pub login_path: String,

    /// Path of the login completion endpoint.
    pub completion_path: String,

    /// Where the browser lands once cookies are in place.
    pub post_login_redirect: String,

    /// Delay before the completion page navigates away, in milliseconds.
    pub redirect_delay_ms: u64,

    /// Whether issued cookies carry the `Secure` attribute.
    /// Must match the deployment's transport; there is no default.
    pub cookie_secure: Option<bool>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_password: SecretString::from(FALLBACK_PASSWORD.to_string()),
            login_path: "/planka-login".to_string(),
            completion_path: "/proxy-auth-login".to_string(),
            post_login_redirect: "/".to_string(),
            redirect_delay_ms: 2000,
            cookie_secure: None,
        }
    }
}

/// WebSocket handshake configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Value written into `Origin` on upgrade handshakes sent to the backend.
    /// Falls back to the backend's own origin when unset.
    pub origin: Option<String>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins allowed to send credentialed requests.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "https://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "https://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

/// Timeout configuration for forwarded traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the backend to produce response headers, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_match_local_deployment() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3001");
        assert_eq!(config.backend.base_url, "http://localhost:4000");
        assert_eq!(config.backend.login_path, "/api/access-tokens");
        assert_eq!(config.auth.login_path, "/planka-login");
        assert_eq!(config.auth.completion_path, "/proxy-auth-login");
        assert_eq!(config.auth.default_password.expose_secret(), FALLBACK_PASSWORD);
        assert!(config.auth.cookie_secure.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [backend]
            base_url = "http://planka:1337"

            [auth]
            cookie_secure = true
            default_password = "hunter2"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "http://planka:1337");
        assert_eq!(config.backend.login_timeout_secs, 10);
        assert_eq!(config.auth.cookie_secure, Some(true));
        assert_eq!(config.auth.default_password.expose_secret(), "hunter2");
        assert_eq!(config.auth.post_login_redirect, "/");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
