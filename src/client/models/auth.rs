//! Authentication models

use serde::{Deserialize, Serialize};

/// Token response from `/auth/login` and `/auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Newly issued access token
    pub access_token: String,

    /// Rotated refresh token (refresh responses may omit it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Authorization scheme, usually `bearer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Body of `POST /auth/login`
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/refresh`
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body of `POST /auth/logout`
#[derive(Debug, Serialize)]
pub struct LogoutRequest<'a> {
    pub refresh_token: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_with_optional_fields_missing() {
        let grant: TokenGrant = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(grant.access_token, "abc");
        assert!(grant.refresh_token.is_none());
        assert!(grant.token_type.is_none());
    }

    #[test]
    fn test_grant_ignores_user_payload() {
        let body = r#"{
            "access_token": "abc",
            "refresh_token": "def",
            "token_type": "bearer",
            "user": {"id": "u-1", "email": "dev@example.com", "role": "admin"}
        }"#;
        let grant: TokenGrant = serde_json::from_str(body).unwrap();
        assert_eq!(grant.refresh_token.as_deref(), Some("def"));
    }

    #[test]
    fn test_refresh_request_body() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "r-1",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"refresh_token": "r-1"}));
    }
}
