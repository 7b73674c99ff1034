//! Backend HTTP client

pub mod api;
pub mod http;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod rate_limit;

pub use api::{AuthApi, DispatchApi};
pub use http::HttpTransport;
pub use models::{ApiRequest, ApiResponse, TokenGrant};

use crate::error::ApiError;

/// Result type for transport and pipeline operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Everything the token pipeline needs from the wire
///
/// Automatically implemented for any type implementing both sub-traits.
pub trait Transport: AuthApi + DispatchApi {}

impl<T: AuthApi + DispatchApi> Transport for T {}
