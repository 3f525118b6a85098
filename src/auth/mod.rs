//! Login bridging and client-held session state.
//!
//! # Data Flow
//! ```text
//! /planka-login      → bridge.rs (backend login, redirect with token)
//! /proxy-auth-login  → bridge.rs (cookie issue, HTML hand-off)
//! every request      → session.rs (accessToken cookie → BackendToken)
//! ```

pub mod bridge;
pub mod error;
pub mod session;

pub use bridge::{BridgeSettings, CredentialBridge, EstablishedSession, LoginCompletion, LoginRedirect};
pub use error::AuthError;
pub use session::{access_token, BackendToken, CookiePolicy};
