//! Interception points around forwarding.
//!
//! The forwarders own the mechanics (URI rewriting, hop-by-hop stripping,
//! splicing); a [`ForwardHooks`] implementation owns the policy of what the
//! backend gets to see. [`CredentialInjector`] is the policy the proxy ships.

use axum::http::header::{AUTHORIZATION, ORIGIN};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};

use crate::auth::access_token;
use crate::http::error::ProxyError;

/// Which forwarder produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardKind {
    Http,
    Upgrade,
}

impl ForwardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardKind::Http => "http",
            ForwardKind::Upgrade => "upgrade",
        }
    }
}

/// What was being forwarded when something went wrong. Never holds the query
/// string, which may carry tokens.
#[derive(Debug, Clone)]
pub struct ForwardContext {
    pub kind: ForwardKind,
    pub method: Method,
    pub path: String,
    pub request_id: String,
}

/// Mutations applied to every outbound request, plus an error observer.
///
/// `before_*` run after the forwarder's own header hygiene, so a hook sees
/// (and may override) the final outbound headers apart from `Host`.
pub trait ForwardHooks: Send + Sync {
    fn before_forward_http(&self, request: &mut Parts);

    fn before_forward_upgrade(&self, request: &mut Parts);

    fn on_forward_error(&self, error: &ProxyError, context: &ForwardContext) {
        tracing::error!(
            request_id = %context.request_id,
            kind = context.kind.as_str(),
            method = %context.method,
            path = %context.path,
            error = %error,
            "Proxy error"
        );
    }
}

/// Turns the `accessToken` cookie into credentials the backend accepts.
///
/// - HTTP: `Authorization: Bearer <token>`, replacing anything the client sent
/// - Upgrade: cookies pass untouched, `Origin` becomes the deployment origin
#[derive(Debug, Clone)]
pub struct CredentialInjector {
    upgrade_origin: HeaderValue,
}

impl CredentialInjector {
    pub fn new(upgrade_origin: HeaderValue) -> Self {
        Self { upgrade_origin }
    }
}

impl ForwardHooks for CredentialInjector {
    fn before_forward_http(&self, request: &mut Parts) {
        if let Some(bearer) = access_token(&request.headers).and_then(|t| t.bearer_header()) {
            request.headers.insert(AUTHORIZATION, bearer);
        }
    }

    fn before_forward_upgrade(&self, request: &mut Parts) {
        request.headers.insert(ORIGIN, self.upgrade_origin.clone());
    }
}
