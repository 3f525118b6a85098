//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Validate configuration and assemble the credential bridge and forwarders
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, CORS, upgrade interception)
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{BridgeSettings, CredentialBridge};
use crate::backend::{BackendLoginClient, BackendTarget, TargetError};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, CorsConfig, ProxyConfig};
use crate::http::forward::HttpForwarder;
use crate::http::handlers::{health, login_completion, login_trigger, proxy, upgrade_interceptor};
use crate::http::hooks::{CredentialInjector, ForwardHooks};
use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::upgrade::UpgradeForwarder;

/// Failures while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid backend URL: {0}")]
    Target(#[from] TargetError),

    #[error("failed to build backend login client: {0}")]
    LoginClient(#[from] reqwest::Error),

    #[error("invalid WebSocket origin '{0}'")]
    UpgradeOrigin(String),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<CredentialBridge>,
    pub forwarder: HttpForwarder,
    pub upgrader: UpgradeForwarder,
}

/// HTTP server for the authenticating proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that injects credentials from the `accessToken` cookie.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let target = BackendTarget::parse(&config.backend.base_url)?;

        let origin = config
            .websocket
            .origin
            .clone()
            .unwrap_or_else(|| target.origin());
        let origin = HeaderValue::from_str(&origin).map_err(|_| ServerError::UpgradeOrigin(origin.clone()))?;

        Self::with_hooks(config, Arc::new(CredentialInjector::new(origin)))
    }

    /// Create a server with custom forwarding hooks.
    pub fn with_hooks(config: ProxyConfig, hooks: Arc<dyn ForwardHooks>) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let target = BackendTarget::parse(&config.backend.base_url)?;

        let login_client = BackendLoginClient::new(
            &target,
            &config.backend.login_path,
            config.auth.default_password.clone(),
            Duration::from_secs(config.backend.login_timeout_secs),
        )?;
        let bridge = CredentialBridge::new(login_client, BridgeSettings::from_config(&config.auth));

        let state = AppState {
            bridge: Arc::new(bridge),
            forwarder: HttpForwarder::new(target.clone(), hooks.clone(), &config.timeouts),
            upgrader: UpgradeForwarder::new(target, hooks, &config.timeouts),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(health).fallback(proxy))
            .route(&config.auth.login_path, get(login_trigger).fallback(proxy))
            .route(&config.auth.completion_path, get(login_completion).fallback(proxy))
            .fallback(proxy)
            .layer(middleware::from_fn_with_state(state.clone(), upgrade_interceptor))
            .with_state(state)
            .layer(cors_layer(&config.cors))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                // Path only: query strings carry tokens.
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.base_url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // A closed channel means the coordinator is gone; stop as well.
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
}
