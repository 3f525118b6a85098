//! Backend application interface.
//!
//! # Data Flow
//! ```text
//! ProxyConfig.backend.base_url
//!     → target.rs (BackendTarget: authority, origin, URI rewriting)
//!     → login.rs (POST /api/access-tokens, raw outcome + Set-Cookie)
//! ```
//!
//! The backend is a black box: only its base URL and its token endpoint are
//! known to the proxy.

pub mod login;
pub mod target;

pub use login::{BackendError, BackendLoginClient, LoginResponse};
pub use target::{BackendTarget, TargetError};
