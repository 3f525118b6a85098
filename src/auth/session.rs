//! Client-held session state.
//!
//! There is no server-side session table: everything needed to authorize a
//! request lives in the client's cookie jar and is re-read on every request.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Cookie carrying the bearer token for cookie-only clients.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
/// Companion cookie the Planka front-end checks alongside the token.
pub const ACCESS_TOKEN_VERSION_COOKIE: &str = "accessTokenVersion";
pub const ACCESS_TOKEN_VERSION: &str = "1";

/// Opaque bearer credential issued by the backend.
///
/// Never parsed, never validated. `Debug` is redacted so the value cannot end
/// up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendToken(String);

impl BackendToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Bearer <token>` marked sensitive so HTTP/2 encoders never index it.
    pub fn bearer_header(&self) -> Option<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0)).ok()?;
        value.set_sensitive(true);
        Some(value)
    }
}

impl std::fmt::Debug for BackendToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BackendToken(<redacted>)")
    }
}

/// Attributes applied to the proxy-managed cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Emit `Secure`; must match whether clients reach the proxy over TLS.
    pub secure: bool,
}

impl CookiePolicy {
    /// The `accessToken` / `accessTokenVersion` pair for a freshly issued token.
    ///
    /// Not HTTP-only: the front-end reads them from script.
    pub fn session_cookies(&self, token: &BackendToken) -> CookieJar {
        CookieJar::new()
            .add(self.cookie(ACCESS_TOKEN_COOKIE, token.expose().to_owned()))
            .add(self.cookie(ACCESS_TOKEN_VERSION_COOKIE, ACCESS_TOKEN_VERSION.to_owned()))
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(false)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }
}

/// The bearer token a client presents through its `accessToken` cookie.
///
/// Values are percent-decoded; a value that does not decode to UTF-8 is
/// used as sent.
pub fn access_token(headers: &HeaderMap) -> Option<BackendToken> {
    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .or_else(|| raw_cookie_value(headers, ACCESS_TOKEN_COOKIE))
        .filter(|value| !value.is_empty())
        .map(BackendToken::new)
}

fn raw_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}
