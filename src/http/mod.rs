//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, CORS)
//!     → handlers.rs (upgrade interception, health, login routes)
//!     → forward.rs  (plain requests, pooled client)
//!       upgrade.rs  (WebSocket handshakes, raw splice)
//!     → hooks.rs    (credential injection, error reporting)
//!     → Backend
//! ```

pub mod error;
pub mod forward;
pub mod handlers;
pub mod hooks;
pub mod request;
pub mod server;
pub mod upgrade;

pub use error::ProxyError;
pub use hooks::{CredentialInjector, ForwardContext, ForwardHooks, ForwardKind};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
