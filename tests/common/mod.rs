//! Shared utilities for integration testing: a mock Planka backend and a
//! proxy started in front of it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use planka_auth_proxy::config::ProxyConfig;
use planka_auth_proxy::{HttpServer, Shutdown};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TEST_PASSWORD: &str = "test-password";
pub const WS_ORIGIN: &str = "https://planka.example.net";

/// How the mock answers `POST /api/access-tokens`.
#[derive(Clone)]
pub enum LoginReply {
    /// 200 `{"item": token}` plus the given `Set-Cookie` headers.
    Token {
        token: &'static str,
        cookies: Vec<&'static str>,
    },
    /// Arbitrary status, content type and body.
    Status {
        status: u16,
        content_type: &'static str,
        body: &'static str,
    },
    /// 200 without an `item` field.
    NoToken,
    /// Never answers.
    Hang,
}

/// A request the mock backend received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

struct MockState {
    login: LoginReply,
    logins: Mutex<Vec<Value>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockState {
    fn record(&self, method: Method, uri: &Uri, headers: HeaderMap) {
        self.requests.lock().unwrap().push(Recorded {
            method,
            uri: uri.to_string(),
            headers,
        });
    }
}

/// Handle on a running mock backend.
#[derive(Clone)]
pub struct MockPlanka {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockPlanka {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// JSON bodies of every login call, in order.
    pub fn logins(&self) -> Vec<Value> {
        self.state.logins.lock().unwrap().clone()
    }

    /// Every non-login request, in order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("backend received no request")
    }
}

/// Start a mock Planka on an ephemeral port.
pub async fn spawn_planka(login: LoginReply) -> MockPlanka {
    let state = Arc::new(MockState {
        login,
        logins: Mutex::new(Vec::new()),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/api/access-tokens", post(access_tokens))
        .route("/socket", get(socket))
        .route("/missing", any(missing))
        .fallback(echo)
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockPlanka { addr, state }
}

async fn access_tokens(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.logins.lock().unwrap().push(body);

    match state.login.clone() {
        LoginReply::Token { token, cookies } => {
            let mut response = Json(json!({ "item": token })).into_response();
            for cookie in cookies {
                response
                    .headers_mut()
                    .append(SET_COOKIE, HeaderValue::from_static(cookie));
            }
            response
        }
        LoginReply::Status {
            status,
            content_type,
            body,
        } => (
            StatusCode::from_u16(status).unwrap(),
            [(CONTENT_TYPE, content_type)],
            body,
        )
            .into_response(),
        LoginReply::NoToken => Json(json!({ "included": {} })).into_response(),
        LoginReply::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn socket(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    state.record(method, &uri, headers);
    ws.on_upgrade(echo_socket)
}

async fn echo_socket(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn missing(State(state): State<Arc<MockState>>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    state.record(method, &uri, headers);
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

async fn echo(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let reply = json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "body": String::from_utf8_lossy(&body),
    });
    state.record(method, &uri, headers);
    ([("x-backend", "planka")], Json(reply)).into_response()
}

/// Proxy configuration pointing at `base_url`, tuned for tests.
pub fn proxy_config(base_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backend.base_url = base_url.to_string();
    config.backend.login_timeout_secs = 2;
    config.auth.default_password = SecretString::from(TEST_PASSWORD.to_string());
    config.auth.cookie_secure = Some(false);
    config.websocket.origin = Some(WS_ORIGIN.to_string());
    config.timeouts.connect_secs = 2;
    config.timeouts.request_secs = 2;
    config
}

/// A running proxy. Dropping it shuts the proxy down.
pub struct TestProxy {
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, shutdown_rx).await.unwrap();
    });

    TestProxy {
        addr,
        _shutdown: shutdown,
    }
}

/// HTTP client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A backend that accepts connections and never writes a byte.
pub async fn spawn_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}
