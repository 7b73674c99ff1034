//! reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Serialize;

use super::models::{LoginRequest, LogoutRequest, RefreshRequest};
use super::rate_limit::{EndpointCategory, RateLimiterSet};
use super::{ApiRequest, ApiResponse, ApiResult, AuthApi, DispatchApi, TokenGrant};
use crate::credentials::{CredentialPair, bearer};
use crate::error::{ApiError, Result};

/// Backend used when nothing is configured
pub const DEFAULT_API_HOST: &str = "http://localhost:8000";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport for the backend
pub struct HttpTransport {
    http: HttpClient,
    base_url: String,
    rate_limiter: RateLimiterSet,
}

impl HttpTransport {
    /// Create a transport for `base_url` with the default timeout
    #[cfg(test)]
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: RateLimiterSet::new(),
        })
    }

    /// Host this transport talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// POST a JSON body to an `/auth/*` endpoint
    async fn post_auth<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        access_token: Option<&str>,
    ) -> ApiResult<ApiResponse> {
        self.rate_limiter.wait_for(EndpointCategory::Auth).await;

        let mut builder = self.http.post(self.url(path)).json(body);
        if let Some(token) = access_token {
            builder = builder.header(AUTHORIZATION, bearer(token));
        }

        let response = read_response(builder.send().await?).await?;
        if response.status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limiter.activate(EndpointCategory::Auth);
        }
        debug!("POST {} -> {}", path, response.status);
        Ok(response)
    }
}

/// Collect status, `Retry-After` and body from a reqwest response
async fn read_response(response: reqwest::Response) -> ApiResult<ApiResponse> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to read response: {}", e)))?;

    let mut response = ApiResponse::new(status, body);
    response.retry_after = retry_after;
    Ok(response)
}

/// Parse a token response body
fn parse_grant(response: &ApiResponse) -> ApiResult<TokenGrant> {
    serde_json::from_str(&response.body).map_err(|e| {
        ApiError::InvalidResponse(format!(
            "Failed to parse token response: {}. Body was: {}",
            e, response.body
        ))
    })
}

#[async_trait]
impl DispatchApi for HttpTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> ApiResult<ApiResponse> {
        let category = EndpointCategory::from_path(&request.path);
        self.rate_limiter.wait_for(category).await;

        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));
        if let Some(token) = access_token {
            builder = builder.header(AUTHORIZATION, bearer(token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = read_response(builder.send().await?).await?;
        if response.status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limiter.activate(category);
        }
        debug!("{} -> {}", request, response.status);
        Ok(response)
    }
}

#[async_trait]
impl AuthApi for HttpTransport {
    async fn login(&self, email: &str, password: &str) -> ApiResult<TokenGrant> {
        let response = self
            .post_auth("/auth/login", &LoginRequest { email, password }, None)
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidCredentials);
        }
        parse_grant(&response.error_for_status()?)
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenGrant> {
        let response = self
            .post_auth("/auth/refresh", &RefreshRequest { refresh_token }, None)
            .await?;
        parse_grant(&response.error_for_status()?)
    }

    async fn logout(&self, credentials: &CredentialPair) -> ApiResult<()> {
        let body = LogoutRequest {
            refresh_token: &credentials.refresh_token,
        };
        self.post_auth("/auth/logout", &body, Some(&credentials.access_token))
            .await?
            .error_for_status()?;
        Ok(())
    }
}
