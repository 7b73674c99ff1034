//! Request/response pair carried through the token pipeline

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// An outbound resource call.
///
/// Holds everything needed to dispatch it again after a credential refresh;
/// the `Authorization` header is attached at dispatch time, never stored here.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,

    /// Path relative to the API host (e.g., "/projects/42")
    pub path: String,

    /// JSON payload
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request without a body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[allow(dead_code)]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    #[allow(dead_code)]
    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    #[allow(dead_code)]
    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    #[allow(dead_code)]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON payload
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A response as received from the backend.
///
/// The pipeline only inspects `status` for 401/403; everything else is left
/// to the caller, typically via [`ApiResponse::error_for_status`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status
    pub status: StatusCode,

    /// Parsed `Retry-After` header, if present
    pub retry_after: Option<Duration>,

    /// Raw response body
    pub body: String,
}

impl ApiResponse {
    /// Build a response with an empty `Retry-After`
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response body as text
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Turn non-2xx statuses into the matching [`ApiError`].
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        let status = self.status;
        if self.is_success() {
            return Ok(self);
        }

        let message = |fallback: &str| {
            if self.body.trim().is_empty() {
                fallback.to_string()
            } else {
                self.body.clone()
            }
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::NOT_FOUND => ApiError::NotFound(message("Resource not found")),
            StatusCode::TOO_MANY_REQUESTS => {
                ApiError::RateLimit(self.retry_after.unwrap_or(Duration::from_secs(60)))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ApiError::BadRequest(message("Bad request"))
            }
            status if status.is_server_error() => {
                ApiError::ServerError(message(&format!("Server error: {}", status)))
            }
            status => ApiError::InvalidResponse(format!("Unexpected status code: {}", status)),
        })
    }
}
