//! Credential bridge errors and their HTTP rendering.
//!
//! Backend-originated failures keep the backend's status and body. Failures
//! that originate in the proxy become short JSON documents with no internals.

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Neither `email` nor `emailOrUsername` was supplied.
    #[error("missing identity")]
    MissingIdentity,

    /// The backend could not be called at all.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The backend answered with a non-2xx status.
    #[error("backend rejected login with status {status}")]
    LoginRejected {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// The backend answered 2xx but without a token.
    #[error("backend response carried no token")]
    TokenMissing,
}

impl AuthError {
    /// Status code the client will see.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingIdentity => StatusCode::BAD_REQUEST,
            AuthError::Backend(BackendError::Unreachable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Backend(BackendError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AuthError::Backend(BackendError::Transport(_)) => StatusCode::BAD_GATEWAY,
            AuthError::LoginRejected { status, .. } => *status,
            AuthError::TokenMissing => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AuthError::MissingIdentity => "missing_identity",
            AuthError::Backend(BackendError::Unreachable { .. }) => "backend_unreachable",
            AuthError::Backend(BackendError::Timeout(_)) => "backend_timeout",
            AuthError::Backend(BackendError::Transport(_)) => "backend_transport",
            AuthError::LoginRejected { .. } => "login_rejected",
            AuthError::TokenMissing => "token_missing",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AuthError::MissingIdentity => (status, "Missing email").into_response(),
            AuthError::Backend(BackendError::Unreachable { .. }) => (
                status,
                Json(json!({
                    "error": "Cannot reach backend",
                    "details": "Connection to the backend failed",
                })),
            )
                .into_response(),
            AuthError::Backend(BackendError::Timeout(secs)) => (
                status,
                Json(json!({
                    "error": "Backend did not respond",
                    "details": format!("Login timed out after {} seconds", secs),
                })),
            )
                .into_response(),
            AuthError::Backend(BackendError::Transport(_)) => (
                status,
                Json(json!({ "error": "Login request to backend failed" })),
            )
                .into_response(),
            AuthError::LoginRejected {
                content_type, body, ..
            } => {
                let mut response = Response::new(Body::from(body));
                *response.status_mut() = status;
                if let Some(content_type) = content_type {
                    response.headers_mut().insert(CONTENT_TYPE, content_type);
                }
                response
            }
            AuthError::TokenMissing => (
                status,
                Json(json!({ "error": "Login failed - no token received" })),
            )
                .into_response(),
        }
    }
}
