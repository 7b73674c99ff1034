//! Wire models exchanged with the backend
//!
//! - [`ApiRequest`] / [`ApiResponse`] - opaque resource calls routed through the pipeline
//! - [`TokenGrant`] and the auth request bodies - `/auth/*` payloads

mod auth;
mod exchange;

pub use auth::{LoginRequest, LogoutRequest, RefreshRequest, TokenGrant};
pub use exchange::{ApiRequest, ApiResponse};
