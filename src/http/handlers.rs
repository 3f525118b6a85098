//! Route handlers.
//!
//! # Routes
//! - `GET /health`: liveness, never touches the backend
//! - `GET /planka-login`: login trigger (credential bridge, step 1)
//! - `GET /proxy-auth-login`: login completion (credential bridge, step 2)
//! - everything else: request forwarder
//! - any upgrade handshake, on any path: upgrade forwarder (middleware)

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{AuthError, LoginCompletion, LoginRedirect};
use crate::http::server::AppState;
use crate::security::headers::is_upgrade_request;

/// Query of the login trigger. `email` wins when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct LoginTriggerQuery {
    pub email: Option<String>,
    #[serde(rename = "emailOrUsername")]
    pub email_or_username: Option<String>,
}

impl LoginTriggerQuery {
    pub fn identity(&self) -> Option<&str> {
        self.email
            .as_deref()
            .filter(|email| !email.is_empty())
            .or(self.email_or_username.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginCompletionQuery {
    pub token: Option<String>,
    pub email: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn login_trigger(
    State(state): State<AppState>,
    Query(query): Query<LoginTriggerQuery>,
) -> Result<LoginRedirect, AuthError> {
    state.bridge.initiate_login(query.identity()).await
}

pub async fn login_completion(
    State(state): State<AppState>,
    Query(query): Query<LoginCompletionQuery>,
) -> LoginCompletion {
    state
        .bridge
        .complete_login(query.token.as_deref(), query.email.as_deref())
        .await
}

pub async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    let peer = peer_addr(&request);
    state.forwarder.forward(request, peer).await
}

/// Diverts upgrade handshakes to the upgrade forwarder before routing.
pub async fn upgrade_interceptor(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_upgrade_request(request.headers()) {
        let peer = peer_addr(&request);
        return state.upgrader.forward(request, peer).await;
    }
    next.run(request).await
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_takes_precedence_over_username() {
        let query = LoginTriggerQuery {
            email: Some("alice@example.com".into()),
            email_or_username: Some("alice".into()),
        };
        assert_eq!(query.identity(), Some("alice@example.com"));

        let query = LoginTriggerQuery {
            email: Some(String::new()),
            email_or_username: Some("alice".into()),
        };
        assert_eq!(query.identity(), Some("alice"));

        assert_eq!(LoginTriggerQuery::default().identity(), None);
    }

    #[tokio::test]
    async fn health_reports_timestamp() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "healthy");
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}
