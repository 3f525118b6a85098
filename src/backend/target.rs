//! The backend the proxy fronts.
//!
//! # Responsibilities
//! - Parse and hold the configured base URL
//! - Produce outbound URIs for forwarded requests (host rewriting)
//! - Expose the authority, dial address and origin of the backend

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Uri};
use thiserror::Error;
use url::Url;

/// Errors raised while interpreting the backend base URL.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("'{url}' is not a valid URL: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("scheme '{0}' is not supported; the backend must be reached over plain http")]
    UnsupportedScheme(String),

    #[error("'{0}' has no usable host")]
    MissingHost(String),
}

/// Immutable description of the single backend application.
#[derive(Debug, Clone)]
pub struct BackendTarget {
    base_url: Url,
    authority: Authority,
    host_header: HeaderValue,
    /// Path prefix of the base URL without a trailing slash ("" for root).
    base_path: String,
}

impl BackendTarget {
    /// Parse a base URL such as `http://planka:1337`.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let base_url = Url::parse(raw).map_err(|source| TargetError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;

        if base_url.scheme() != "http" {
            return Err(TargetError::UnsupportedScheme(base_url.scheme().to_string()));
        }

        let host = base_url
            .host_str()
            .ok_or_else(|| TargetError::MissingHost(raw.to_string()))?;
        let authority = match base_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority: Authority = authority
            .parse()
            .map_err(|_| TargetError::MissingHost(raw.to_string()))?;
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|_| TargetError::MissingHost(raw.to_string()))?;

        let base_path = base_url.path().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            authority,
            host_header,
            base_path,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value for the `Host` header on outbound requests.
    pub fn host_header(&self) -> HeaderValue {
        self.host_header.clone()
    }

    /// `host:port` suitable for dialing a raw TCP connection.
    pub fn connect_address(&self) -> String {
        let host = self.base_url.host_str().unwrap_or("localhost");
        let port = self.base_url.port_or_known_default().unwrap_or(80);
        format!("{}:{}", host, port)
    }

    /// Serialized origin of the backend, e.g. `http://planka:1337`.
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }

    /// Absolute URL of a backend endpoint such as `/api/access-tokens`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.origin(), self.base_path, path)
    }

    /// Origin-form request target (`/prefix/path?query`) for a client path.
    pub fn path_for(&self, path_and_query: Option<&PathAndQuery>) -> Result<PathAndQuery, axum::http::Error> {
        let requested = path_and_query.map(PathAndQuery::as_str).unwrap_or("/");
        let joined = format!("{}{}", self.base_path, requested);
        Ok(PathAndQuery::try_from(joined)?)
    }

    /// Absolute-form URI on the backend for a client path.
    pub fn uri_for(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(self.path_for(path_and_query)?)
            .build()
    }
}
