//! Credential pair held by the pipeline and its storage backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::models::TokenGrant;
use crate::error::ApiError;

pub mod store;

#[cfg(test)]
pub use store::MemoryStore;
pub use store::{CredentialStore, FileStore, StorageKind};

/// Clock skew tolerated before an access token counts as expired
const EXPIRY_SKEW_SECS: i64 = 30;

/// Current authentication state: an access token and the refresh token that renews it.
///
/// Always replaced as a whole. Storage backends write the pair in one
/// operation and the pipeline never mutates a field in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived token attached to every request
    pub access_token: String,

    /// Longer-lived token used only against `/auth/refresh`
    pub refresh_token: String,

    /// Authorization scheme, normally `bearer`
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Access token expiry, when the token is a JWT carrying `exp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl CredentialPair {
    /// Build a pair, reading the expiry out of the access token if it is a JWT.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        let expires_at = jwt_expiry(&access_token);
        Self {
            access_token,
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
            expires_at,
        }
    }

    /// Build a pair from a login or refresh response.
    ///
    /// Servers that do not rotate refresh tokens omit it from the refresh
    /// response; `previous_refresh` is carried forward in that case.
    pub fn from_grant(
        grant: TokenGrant,
        previous_refresh: Option<&str>,
    ) -> std::result::Result<Self, ApiError> {
        let refresh_token = grant
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or_else(|| {
                ApiError::InvalidResponse("Token response is missing refresh_token".to_string())
            })?;

        let mut pair = Self::new(grant.access_token, refresh_token);
        if let Some(token_type) = grant.token_type {
            pair.token_type = token_type;
        }
        Ok(pair)
    }

    /// Whether the access token is known to be expired (or about to be).
    ///
    /// Opaque tokens have no known expiry and are never reported expired;
    /// the server's 401 is the authority for those.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => {
                expires_at - chrono::Duration::seconds(EXPIRY_SKEW_SECS) < Utc::now()
            }
        }
    }
}

/// Format an access token as a bearer `Authorization` header value
pub fn bearer(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}

/// Extract the `exp` claim from a JWT without verifying its signature.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    use base64::{Engine as _, engine::general_purpose};

    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}
