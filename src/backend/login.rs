//! Backend token endpoint client.
//!
//! Performs `POST {base}/api/access-tokens` with `{emailOrUsername, password}`
//! and hands back the raw outcome. Interpreting the outcome (success, rejection,
//! missing token) is the credential bridge's job.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::{ACCEPT, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::BackendToken;
use crate::backend::BackendTarget;

/// Transport-level failures talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// DNS resolution or TCP connect failed.
    #[error("cannot reach backend at {target}")]
    Unreachable {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend did not answer within {0} seconds")]
    Timeout(u64),

    /// Anything else: protocol errors, truncated bodies.
    #[error("backend request failed")]
    Transport(#[source] reqwest::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email_or_username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AccessTokenEnvelope {
    item: Option<String>,
}

/// Everything the proxy keeps from one backend login call.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
    /// Every `Set-Cookie` header, untouched.
    pub set_cookies: Vec<HeaderValue>,
}

impl LoginResponse {
    /// The bearer token carried in the `item` field, if any.
    pub fn token(&self) -> Option<BackendToken> {
        serde_json::from_slice::<AccessTokenEnvelope>(&self.body)
            .ok()
            .and_then(|envelope| envelope.item)
            .filter(|token| !token.is_empty())
            .map(BackendToken::new)
    }
}

/// Client for the backend's token-issuing endpoint.
#[derive(Clone)]
pub struct BackendLoginClient {
    client: reqwest::Client,
    endpoint: String,
    password: SecretString,
    timeout_secs: u64,
}

impl BackendLoginClient {
    /// Build a client. Redirects are never followed so the real outcome of the
    /// login call stays visible.
    pub fn new(
        target: &BackendTarget,
        login_path: &str,
        password: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            endpoint: target.endpoint(login_path),
            password,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Absolute URL the login call is sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Log `identity` in with the shared password. Any HTTP status is a
    /// successful call here; only transport problems are errors.
    pub async fn request_token(&self, identity: &str) -> Result<LoginResponse, BackendError> {
        let payload = LoginRequest {
            email_or_username: identity,
            password: self.password.expose_secret(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .cloned()
            .collect();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        tracing::debug!(
            endpoint = %self.endpoint,
            status = %status,
            "Backend login call returned"
        );

        Ok(LoginResponse {
            status,
            content_type,
            body,
            set_cookies,
        })
    }

    fn classify(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout(self.timeout_secs)
        } else if error.is_connect() {
            BackendError::Unreachable {
                target: self.endpoint.clone(),
                source: error,
            }
        } else {
            BackendError::Transport(error)
        }
    }
}
