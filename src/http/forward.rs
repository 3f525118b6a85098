//! Request forwarder for plain HTTP traffic.
//!
//! # Responsibilities
//! - Rewrite the request target and `Host` onto the backend
//! - Strip hop-by-hop headers, add `X-Forwarded-*`
//! - Run the `before_forward_http` hook (credential injection)
//! - Stream the body both ways; relay the backend's status and headers
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Backend statuses are never rewritten; only proxy failures become 5xx
//! - The timeout covers the wait for response headers, not the body stream

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::{Request, Version};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::backend::BackendTarget;
use crate::config::TimeoutConfig;
use crate::http::error::{classify_client_error, ProxyError};
use crate::http::hooks::{ForwardContext, ForwardHooks, ForwardKind};
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::security::headers::{append_forwarded, fold_cookie_headers, strip_hop_by_hop};

/// Forwards non-upgrade requests through a pooled HTTP/1.1 client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    target: BackendTarget,
    hooks: Arc<dyn ForwardHooks>,
    request_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(target: BackendTarget, hooks: Arc<dyn ForwardHooks>, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            target,
            hooks,
            request_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }

    /// Turn an inbound request into the request the backend will receive.
    pub fn prepare(&self, request: Request<Body>, peer: Option<SocketAddr>) -> Result<Request<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();

        parts.uri = self
            .target
            .uri_for(parts.uri.path_and_query())
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        fold_cookie_headers(&mut parts.headers);
        append_forwarded(&mut parts.headers, peer.map(|addr| addr.ip()));
        parts.headers.insert(HOST, self.target.host_header());

        self.hooks.before_forward_http(&mut parts);

        Ok(Request::from_parts(parts, body))
    }

    /// Forward `request` and relay whatever the backend answers.
    pub async fn forward(&self, request: Request<Body>, peer: Option<SocketAddr>) -> Response {
        let start = Instant::now();
        let context = ForwardContext {
            kind: ForwardKind::Http,
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            request_id: request_id(request.headers()),
        };

        let outbound = match self.prepare(request, peer) {
            Ok(outbound) => outbound,
            Err(e) => return self.fail(e, &context, start),
        };

        tracing::debug!(
            request_id = %context.request_id,
            method = %context.method,
            path = %context.path,
            "Forwarding request"
        );

        match tokio::time::timeout(self.request_timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                metrics::record_request(ForwardKind::Http.as_str(), parts.status.as_u16(), start);
                Response::from_parts(parts, Body::new(body))
            }
            Ok(Err(e)) => self.fail(classify_client_error(&e), &context, start),
            Err(_) => self.fail(
                ProxyError::Timeout(self.request_timeout.as_secs()),
                &context,
                start,
            ),
        }
    }

    fn fail(&self, error: ProxyError, context: &ForwardContext, start: Instant) -> Response {
        self.hooks.on_forward_error(&error, context);
        metrics::record_forward_error(ForwardKind::Http.as_str(), error.label());
        metrics::record_request(ForwardKind::Http.as_str(), error.status().as_u16(), start);
        error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::hooks::CredentialInjector;
    use axum::http::header::{AUTHORIZATION, CONNECTION, COOKIE, UPGRADE};
    use axum::http::HeaderValue;
    use crate::security::headers::{X_FORWARDED_FOR, X_FORWARDED_HOST};

    fn forwarder(base: &str) -> HttpForwarder {
        let hooks = Arc::new(CredentialInjector::new(HeaderValue::from_static("https://planka.example.net")));
        HttpForwarder::new(BackendTarget::parse(base).unwrap(), hooks, &TimeoutConfig::default())
    }

    #[tokio::test]
    async fn prepare_rewrites_target_and_injects_bearer() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/cards?filter=mine")
            .header(HOST, "proxy.example.net")
            .header(CONNECTION, "keep-alive")
            .header(COOKIE, "accessToken=tok123")
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = "10.1.2.3:50000".parse().unwrap();

        let outbound = forwarder("http://planka:1337").prepare(request, Some(peer)).unwrap();

        assert_eq!(outbound.uri().to_string(), "http://planka:1337/api/cards?filter=mine");
        assert_eq!(outbound.version(), Version::HTTP_11);
        assert_eq!(outbound.headers()[HOST], "planka:1337");
        assert_eq!(outbound.headers()[AUTHORIZATION], "Bearer tok123");
        assert_eq!(outbound.headers()[&X_FORWARDED_FOR], "10.1.2.3");
        assert_eq!(outbound.headers()[&X_FORWARDED_HOST], "proxy.example.net");
        assert!(!outbound.headers().contains_key(CONNECTION));
        assert!(!outbound.headers().contains_key(UPGRADE));
    }

    #[tokio::test]
    async fn prepare_keeps_base_path_prefix() {
        let request = Request::builder().uri("/boards/1").body(Body::empty()).unwrap();
        let outbound = forwarder("http://planka:1337/app/").prepare(request, None).unwrap();
        assert_eq!(outbound.uri().path(), "/app/boards/1");
    }

    #[tokio::test]
    async fn unreachable_backend_is_503() {
        // Port 9 (discard) on loopback is closed in test environments.
        let request = Request::builder().uri("/api/users/me").body(Body::empty()).unwrap();
        let response = forwarder("http://127.0.0.1:9").forward(request, None).await;
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
