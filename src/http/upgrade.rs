//! Upgrade forwarder for WebSocket handshakes.
//!
//! # Flow
//! ```text
//! client handshake
//!     → dial backend (fresh connection, never pooled)
//!     → before_forward_upgrade hook (Origin rewrite), Cookie passed through
//!     → backend answers 101 → relay 101 to client, splice both sockets
//!     → backend answers anything else → relay that response verbatim
//! ```
//!
//! # Design Decisions
//! - Frames are not parsed; the splice copies bytes
//! - No lifetime limit on a splice; EOF or an I/O error on either side ends both
//! - Failures before the splice carry no body and close the connection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::{CONNECTION, HOST, UPGRADE};
use axum::http::{HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::backend::BackendTarget;
use crate::config::TimeoutConfig;
use crate::http::error::{source_chain, ProxyError};
use crate::http::hooks::{ForwardContext, ForwardHooks, ForwardKind};
use crate::http::request::request_id;
use crate::observability::metrics::{self, WebSocketGauge};
use crate::security::headers::{append_forwarded, fold_cookie_headers, strip_hop_by_hop};

#[derive(Clone)]
pub struct UpgradeForwarder {
    target: BackendTarget,
    hooks: Arc<dyn ForwardHooks>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl UpgradeForwarder {
    pub fn new(target: BackendTarget, hooks: Arc<dyn ForwardHooks>, timeouts: &TimeoutConfig) -> Self {
        Self {
            target,
            hooks,
            connect_timeout: Duration::from_secs(timeouts.connect_secs),
            handshake_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }

    /// Build the outbound handshake. The client body is dropped; handshakes have none.
    pub fn prepare(&self, request: Request<Body>, peer: Option<SocketAddr>) -> Result<Request<Body>, ProxyError> {
        let (mut parts, _body) = request.into_parts();
        let protocol = parts.headers.get(UPGRADE).cloned();

        let path = self
            .target
            .path_for(parts.uri.path_and_query())
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        parts.uri = Uri::from(path);
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        fold_cookie_headers(&mut parts.headers);
        append_forwarded(&mut parts.headers, peer.map(|addr| addr.ip()));
        parts.headers.insert(HOST, self.target.host_header());
        parts.headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
        if let Some(protocol) = protocol {
            parts.headers.insert(UPGRADE, protocol);
        }

        self.hooks.before_forward_upgrade(&mut parts);

        Ok(Request::from_parts(parts, Body::empty()))
    }

    /// Relay the handshake and, on `101`, splice the two connections in the background.
    pub async fn forward(&self, mut request: Request<Body>, peer: Option<SocketAddr>) -> Response {
        let start = Instant::now();
        let context = ForwardContext {
            kind: ForwardKind::Upgrade,
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            request_id: request_id(request.headers()),
        };

        let client_upgrade = hyper::upgrade::on(&mut request);

        let outbound = match self.prepare(request, peer) {
            Ok(outbound) => outbound,
            Err(e) => return self.reject(e, &context, start),
        };

        let mut response = match self.handshake(outbound).await {
            Ok(response) => response,
            Err(e) => return self.reject(e, &context, start),
        };

        metrics::record_request(ForwardKind::Upgrade.as_str(), response.status().as_u16(), start);

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            tracing::warn!(
                request_id = %context.request_id,
                path = %context.path,
                status = %response.status(),
                "Backend declined upgrade"
            );
            let (parts, body) = response.into_parts();
            return Response::from_parts(parts, Body::new(body));
        }

        let backend_upgrade = hyper::upgrade::on(&mut response);
        let hooks = self.hooks.clone();
        tokio::spawn(splice(client_upgrade, backend_upgrade, hooks, context));

        let (parts, _) = response.into_parts();
        Response::from_parts(parts, Body::empty())
    }

    async fn handshake(&self, outbound: Request<Body>) -> Result<Response<hyper::body::Incoming>, ProxyError> {
        let address = self.target.connect_address();
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ProxyError::BackendUnreachable(format!("{}: {}", address, e))),
            Err(_) => return Err(ProxyError::Timeout(self.connect_timeout.as_secs())),
        };
        // Disabling Nagle only fails on a dead socket; the handshake will report that.
        let _ = stream.set_nodelay(true);

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ProxyError::Transport(source_chain(&e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.with_upgrades().await {
                tracing::debug!(error = %e, "Backend upgrade connection ended with error");
            }
        });

        match tokio::time::timeout(self.handshake_timeout, sender.send_request(outbound)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ProxyError::Transport(source_chain(&e))),
            Err(_) => Err(ProxyError::Timeout(self.handshake_timeout.as_secs())),
        }
    }

    fn reject(&self, error: ProxyError, context: &ForwardContext, start: Instant) -> Response {
        self.hooks.on_forward_error(&error, context);
        metrics::record_forward_error(ForwardKind::Upgrade.as_str(), error.label());
        metrics::record_request(ForwardKind::Upgrade.as_str(), error.status().as_u16(), start);
        (error.status(), [(CONNECTION, HeaderValue::from_static("close"))]).into_response()
    }
}

/// Copy bytes both ways until either side closes.
async fn splice(
    client: OnUpgrade,
    backend: OnUpgrade,
    hooks: Arc<dyn ForwardHooks>,
    context: ForwardContext,
) {
    let (client, backend) = match tokio::try_join!(client, backend) {
        Ok(pair) => pair,
        Err(e) => {
            hooks.on_forward_error(&ProxyError::Transport(source_chain(&e)), &context);
            metrics::record_forward_error(ForwardKind::Upgrade.as_str(), "transport");
            return;
        }
    };

    let _gauge = WebSocketGauge::open();
    tracing::info!(request_id = %context.request_id, path = %context.path, "WebSocket tunnel open");

    let mut client = TokioIo::new(client);
    let mut backend = TokioIo::new(backend);

    match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
        Ok((to_backend, to_client)) => tracing::info!(
            request_id = %context.request_id,
            to_backend,
            to_client,
            "WebSocket tunnel closed"
        ),
        Err(e) => {
            hooks.on_forward_error(&ProxyError::Transport(e.to_string()), &context);
            metrics::record_forward_error(ForwardKind::Upgrade.as_str(), "transport");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::hooks::CredentialInjector;
    use axum::http::header::{AUTHORIZATION, COOKIE, ORIGIN};

    fn forwarder(base: &str) -> UpgradeForwarder {
        let hooks = Arc::new(CredentialInjector::new(HeaderValue::from_static("https://planka.example.net")));
        UpgradeForwarder::new(BackendTarget::parse(base).unwrap(), hooks, &TimeoutConfig::default())
    }

    fn handshake_request() -> Request<Body> {
        Request::builder()
            .uri("/socket.io/?EIO=4&transport=websocket")
            .header(HOST, "localhost:3001")
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "websocket")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .header("sec-websocket-version", "13")
            .header(ORIGIN, "http://localhost:3001")
            .header(COOKIE, "accessToken=X")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn prepare_keeps_upgrade_headers_and_rewrites_origin() {
        let outbound = forwarder("http://planka:1337").prepare(handshake_request(), None).unwrap();
        let headers = outbound.headers();

        assert_eq!(outbound.uri().to_string(), "/socket.io/?EIO=4&transport=websocket");
        assert_eq!(headers[HOST], "planka:1337");
        assert_eq!(headers[CONNECTION], "upgrade");
        assert_eq!(headers[UPGRADE], "websocket");
        assert_eq!(headers["sec-websocket-key"], "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(headers[ORIGIN], "https://planka.example.net");
        assert_eq!(headers[COOKIE], "accessToken=X");
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn prepare_folds_repeated_cookie_lines() {
        let mut request = handshake_request();
        request
            .headers_mut()
            .append(COOKIE, HeaderValue::from_static("lang=en"));

        let outbound = forwarder("http://planka:1337").prepare(request, None).unwrap();

        let cookies: Vec<_> = outbound.headers().get_all(COOKIE).iter().collect();
        assert_eq!(cookies, vec!["accessToken=X; lang=en"]);
    }

    #[tokio::test]
    async fn unreachable_backend_closes_without_body() {
        let response = forwarder("http://127.0.0.1:9").forward(handshake_request(), None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[CONNECTION], "close");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}
