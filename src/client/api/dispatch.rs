//! Request dispatch trait

use async_trait::async_trait;

use crate::client::ApiResult;
use crate::client::models::{ApiRequest, ApiResponse};

/// Sends one request to the backend
#[async_trait]
pub trait DispatchApi: Send + Sync {
    /// Dispatch `request`, attaching `access_token` as a bearer credential when given.
    ///
    /// Every HTTP status, including 401 and 403, comes back as `Ok`; only a
    /// failure to get a response at all is an `Err` (normally
    /// [`ApiError::Network`](crate::error::ApiError::Network)).
    async fn execute(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> ApiResult<ApiResponse>;
}
