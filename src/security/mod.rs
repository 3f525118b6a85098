//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → headers.rs (strip hop-by-hop, fold Cookie, add X-Forwarded-*)
//!     → forwarding hooks (credential injection)
//! Inbound response:
//!     → headers.rs (strip hop-by-hop)
//! ```
//!
//! # Design Decisions
//! - Connection-scoped headers never cross the proxy
//! - Tokens and passwords are never logged

pub mod headers;
