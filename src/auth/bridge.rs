//! Credential bridge: login against the backend on behalf of a client.
//!
//! # Flow
//! ```text
//! GET /planka-login?email=alice
//!     → initiate_login: POST /api/access-tokens {alice, shared password}
//!     → 302 /proxy-auth-login?token=..&email=alice
//! GET /proxy-auth-login?token=..&email=alice
//!     → complete_login: repeat the login to harvest backend Set-Cookie headers
//!     → 200 HTML, backend cookies + accessToken/accessTokenVersion
//!     → browser navigates to the application root
//! ```
//!
//! # Design Decisions
//! - Stateless: token and identity travel in the redirect, not in memory
//! - One attempt per call, never retried
//! - Cookie harvest failures are logged, never fatal

use std::time::Duration;

use axum::http::header::{CACHE_CONTROL, LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use url::form_urlencoded;

use crate::auth::error::AuthError;
use crate::auth::session::{BackendToken, CookiePolicy};
use crate::backend::BackendLoginClient;
use crate::config::AuthConfig;
use crate::observability::metrics;

/// Deployment-specific knobs of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Path of the completion endpoint the trigger redirects to.
    pub completion_path: String,
    /// Where the browser goes once cookies are set.
    pub post_login_redirect: String,
    /// How long the completion page waits before navigating.
    pub redirect_delay: Duration,
    pub cookies: CookiePolicy,
}

impl BridgeSettings {
    /// Settings from a validated [`AuthConfig`].
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            completion_path: config.completion_path.clone(),
            post_login_redirect: config.post_login_redirect.clone(),
            redirect_delay: Duration::from_millis(config.redirect_delay_ms),
            cookies: CookiePolicy {
                // Presence is enforced by validation; fall back to the strict choice.
                secure: config.cookie_secure.unwrap_or(true),
            },
        }
    }
}

/// Redirect from the login trigger to the completion endpoint.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub completion_path: String,
    pub token: BackendToken,
    pub identity: String,
}

impl LoginRedirect {
    /// `completion_path?token=..&email=..`, both values percent-encoded.
    pub fn location(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("token", self.token.expose())
            .append_pair("email", &self.identity)
            .finish();
        format!("{}?{}", self.completion_path, query)
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(LOCATION, self.location())]).into_response()
    }
}

/// Outcome of the completion endpoint.
#[derive(Debug)]
pub enum LoginCompletion {
    /// Token or identity missing: send the browser home without cookies.
    Incomplete { redirect_to: String },
    /// Cookies issued; render the hand-off page.
    Established(EstablishedSession),
}

/// Cookies and page for a completed login.
#[derive(Debug)]
pub struct EstablishedSession {
    /// Backend `Set-Cookie` values, forwarded verbatim.
    pub backend_cookies: Vec<HeaderValue>,
    /// `accessToken` and `accessTokenVersion`.
    pub session_cookies: CookieJar,
    pub redirect_to: String,
    pub redirect_delay: Duration,
}

impl EstablishedSession {
    fn page(&self) -> String {
        // Serialized as a JS string literal; `<` escaped so it cannot close the script tag.
        let target = serde_json::to_string(&self.redirect_to)
            .unwrap_or_else(|_| "\"/\"".to_string())
            .replace('<', "\\u003c");
        let href = html_escape(&self.redirect_to);
        format!(
            r#"<!DOCTYPE html>
<html>
  <head><title>Authentication Complete</title></head>
  <body>
    <h2>Authentication set up successfully</h2>
    <p>All cookies configured. Redirecting...</p>
    <script>
      setTimeout(function () {{ window.location.href = {target}; }}, {delay});
    </script>
    <p><a href="{href}">Click here if you are not redirected automatically</a></p>
  </body>
</html>
"#,
            target = target,
            delay = self.redirect_delay.as_millis(),
            href = href,
        )
    }
}

impl IntoResponse for LoginCompletion {
    fn into_response(self) -> Response {
        match self {
            LoginCompletion::Incomplete { redirect_to } => {
                (StatusCode::FOUND, [(LOCATION, redirect_to)]).into_response()
            }
            LoginCompletion::Established(session) => {
                let page = session.page();
                (
                    [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
                    AppendHeaders(session.backend_cookies.into_iter().map(|c| (SET_COOKIE, c))),
                    session.session_cookies,
                    Html(page),
                )
                    .into_response()
            }
        }
    }
}

/// Performs the out-of-band login and re-issues the credential as cookies.
pub struct CredentialBridge {
    backend: BackendLoginClient,
    settings: BridgeSettings,
}

impl CredentialBridge {
    pub fn new(backend: BackendLoginClient, settings: BridgeSettings) -> Self {
        Self { backend, settings }
    }

    /// Obtain a token for `identity` and point the client at the completion endpoint.
    pub async fn initiate_login(&self, identity: Option<&str>) -> Result<LoginRedirect, AuthError> {
        let result = self.try_initiate(identity).await;
        match &result {
            Ok(_) => metrics::record_login("initiate", "success"),
            Err(e) => metrics::record_login("initiate", e.label()),
        }
        result
    }

    async fn try_initiate(&self, identity: Option<&str>) -> Result<LoginRedirect, AuthError> {
        let identity = identity
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingIdentity)?;

        tracing::info!(identity = %identity, endpoint = %self.backend.endpoint(), "Attempting backend login");

        let response = self.backend.request_token(identity).await.map_err(|e| {
            tracing::error!(identity = %identity, error = %e, "Backend login call failed");
            AuthError::from(e)
        })?;

        if !response.status.is_success() {
            tracing::warn!(identity = %identity, status = %response.status, "Backend rejected login");
            return Err(AuthError::LoginRejected {
                status: response.status,
                content_type: response.content_type,
                body: response.body,
            });
        }

        let token = response.token().ok_or_else(|| {
            tracing::error!(identity = %identity, status = %response.status, "Backend login response carried no token");
            AuthError::TokenMissing
        })?;

        tracing::info!(
            identity = %identity,
            backend_cookies = response.set_cookies.len(),
            "Backend login succeeded"
        );

        Ok(LoginRedirect {
            completion_path: self.settings.completion_path.clone(),
            token,
            identity: identity.to_string(),
        })
    }

    /// Issue the session cookies for a token obtained by [`Self::initiate_login`].
    ///
    /// The backend is called again only to collect its own cookies; if that
    /// fails the proxy cookies are still issued.
    pub async fn complete_login(&self, token: Option<&str>, identity: Option<&str>) -> LoginCompletion {
        let (token, identity) = match (
            token.filter(|t| !t.is_empty()),
            identity.filter(|i| !i.is_empty()),
        ) {
            (Some(token), Some(identity)) => (BackendToken::new(token), identity),
            _ => {
                metrics::record_login("complete", "incomplete");
                return LoginCompletion::Incomplete {
                    redirect_to: self.settings.post_login_redirect.clone(),
                };
            }
        };

        let backend_cookies = match self.backend.request_token(identity).await {
            Ok(response) => {
                if !response.status.is_success() {
                    tracing::warn!(
                        identity = %identity,
                        status = %response.status,
                        "Cookie harvest login was not successful"
                    );
                }
                tracing::debug!(count = response.set_cookies.len(), "Forwarding backend cookies");
                response.set_cookies
            }
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Error getting backend auth cookies");
                metrics::record_login("harvest", "failed");
                Vec::new()
            }
        };

        metrics::record_login("complete", "success");

        LoginCompletion::Established(EstablishedSession {
            backend_cookies,
            session_cookies: self.settings.cookies.session_cookies(&token),
            redirect_to: self.settings.post_login_redirect.clone(),
            redirect_delay: self.settings.redirect_delay,
        })
    }
}

fn html_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendTarget;
    use secrecy::SecretString;

    fn settings() -> BridgeSettings {
        BridgeSettings {
            completion_path: "/proxy-auth-login".into(),
            post_login_redirect: "/".into(),
            redirect_delay: Duration::from_millis(2000),
            cookies: CookiePolicy { secure: false },
        }
    }

    fn unreachable_bridge() -> CredentialBridge {
        // Port 9 (discard) on loopback is closed in test environments.
        let target = BackendTarget::parse("http://127.0.0.1:9").unwrap();
        let client = BackendLoginClient::new(
            &target,
            "/api/access-tokens",
            SecretString::from("pw".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        CredentialBridge::new(client, settings())
    }

    #[test]
    fn redirect_location_encodes_parameters() {
        let redirect = LoginRedirect {
            completion_path: "/proxy-auth-login".into(),
            token: BackendToken::new("tok123"),
            identity: "alice@example.com".into(),
        };
        assert_eq!(
            redirect.location(),
            "/proxy-auth-login?token=tok123&email=alice%40example.com"
        );
    }

    #[test]
    fn redirect_parameters_round_trip() {
        let redirect = LoginRedirect {
            completion_path: "/proxy-auth-login".into(),
            token: BackendToken::new("a.b-c_d+e/f="),
            identity: "bob smith+tag@example.com".into(),
        };
        let location = redirect.location();
        let query = location.split_once('?').unwrap().1;
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("token".to_string(), "a.b-c_d+e/f=".to_string()),
                ("email".to_string(), "bob smith+tag@example.com".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_identity_never_calls_backend() {
        let bridge = unreachable_bridge();
        assert!(matches!(
            bridge.initiate_login(None).await,
            Err(AuthError::MissingIdentity)
        ));
        assert!(matches!(
            bridge.initiate_login(Some("")).await,
            Err(AuthError::MissingIdentity)
        ));
    }

    #[tokio::test]
    async fn completion_without_parameters_goes_home() {
        let bridge = unreachable_bridge();
        match bridge.complete_login(Some("tok"), None).await {
            LoginCompletion::Incomplete { redirect_to } => assert_eq!(redirect_to, "/"),
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    #[tokio::test]
    async fn completion_issues_cookies_even_if_harvest_fails() {
        let bridge = unreachable_bridge();
        match bridge.complete_login(Some("tok123"), Some("alice@example.com")).await {
            LoginCompletion::Established(session) => {
                assert!(session.backend_cookies.is_empty());
                assert_eq!(session.session_cookies.get("accessToken").unwrap().value(), "tok123");
                assert_eq!(session.session_cookies.get("accessTokenVersion").unwrap().value(), "1");
            }
            other => panic!("unexpected completion: {:?}", other),
        }
    }

    #[test]
    fn page_redirects_after_delay() {
        let session = EstablishedSession {
            backend_cookies: Vec::new(),
            session_cookies: CookieJar::new(),
            redirect_to: "/boards?x=<y>".into(),
            redirect_delay: Duration::from_millis(1500),
        };
        let page = session.page();
        assert!(page.contains(r#"window.location.href = "/boards?x=\u003cy>";"#));
        assert!(!page.contains("x=<y>"));
        assert!(page.contains("}, 1500);"));
        assert!(page.contains(r#"href="/boards?x=&lt;y&gt;""#));
    }
}
