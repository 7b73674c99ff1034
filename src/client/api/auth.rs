//! Authentication API trait

use async_trait::async_trait;

use crate::client::ApiResult;
use crate::client::models::TokenGrant;
use crate::credentials::CredentialPair;

/// Authentication operations against the backend
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange email and password for a credential pair (`POST /auth/login`)
    async fn login(&self, email: &str, password: &str) -> ApiResult<TokenGrant>;

    /// Exchange a refresh token for new credentials (`POST /auth/refresh`)
    ///
    /// Any error status from the endpoint is returned as an error; the
    /// pipeline treats it as the end of the session.
    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenGrant>;

    /// Invalidate the refresh token server-side (`POST /auth/logout`)
    async fn logout(&self, credentials: &CredentialPair) -> ApiResult<()>;
}
