//! Forwarding failures.
//!
//! Produced by the request and upgrade forwarders, reported through
//! [`ForwardHooks::on_forward_error`](crate::http::hooks::ForwardHooks) and
//! rendered as short plain-text 5xx bodies. Backend status codes never become
//! a `ProxyError`: whatever the backend answers is relayed as-is.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// TCP connect or DNS failure.
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("backend did not respond within {0} seconds")]
    Timeout(u64),

    /// The connection broke after it was established.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The inbound request could not be turned into an outbound one.
    #[error("cannot forward request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BackendUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Transport(_) | ProxyError::InvalidRequest(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProxyError::BackendUnreachable(_) => "unreachable",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::Transport(_) => "transport",
            ProxyError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), format!("Proxy error: {}", self)).into_response()
    }
}

/// Map a hyper-util client failure onto the taxonomy.
pub(crate) fn classify_client_error(error: &hyper_util::client::legacy::Error) -> ProxyError {
    if error.is_connect() {
        ProxyError::BackendUnreachable(source_chain(error))
    } else {
        ProxyError::Transport(source_chain(error))
    }
}

/// `error: cause: cause` without debug formatting.
pub(crate) fn source_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
