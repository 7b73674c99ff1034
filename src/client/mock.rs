//! Mock transport for testing
//!
//! Simulates a backend that accepts a configurable set of access tokens,
//! so pipeline behavior can be driven without a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::watch;

use super::api::{AuthApi, DispatchApi};
use super::models::{ApiRequest, ApiResponse, TokenGrant};
use super::ApiResult;
use crate::credentials::CredentialPair;
use crate::error::ApiError;

/// Mock transport for testing.
///
/// Configure accepted tokens and refresh outcomes via builder methods. Clones
/// share state, so keep one clone for assertions and hand another to the pipeline.
///
/// # Example
/// ```ignore
/// let mock = MockTransport::new()
///     .with_valid_token("fresh")
///     .with_refresh_grant(grant("fresh", "r-2"));
///
/// let pipeline = TokenPipeline::new(mock.clone(), store, PipelineSettings::default());
/// pipeline.send(ApiRequest::get("/projects")).await?;
/// assert_eq!(mock.call_counts().refresh, 1);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Access tokens the backend accepts; anything else gets a 401
    valid_tokens: Arc<Mutex<HashSet<String>>>,
    /// Paths answered with 403 for valid tokens
    forbidden_paths: Arc<Mutex<HashSet<String>>>,
    /// Paths that fail without a response
    offline_paths: Arc<Mutex<HashSet<String>>>,
    /// Paths whose 401 is held back until the gate opens
    rejection_gates: Arc<Mutex<HashMap<String, watch::Receiver<bool>>>>,
    /// Refresh calls wait for this gate when set
    refresh_gate: Arc<Mutex<Option<watch::Receiver<bool>>>>,
    /// Outcomes returned by successive refresh calls
    refresh_outcomes: Arc<Mutex<VecDeque<ApiResult<TokenGrant>>>>,
    /// Grant returned by login
    login_grant: Arc<Mutex<Option<TokenGrant>>>,
    /// Error returned by logout
    logout_error: Arc<Mutex<Option<ApiError>>>,
    /// Track number of calls for verification
    call_count: Arc<Mutex<CallCounts>>,
    /// Captured dispatches for test assertions
    captured_requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Tracks transport call counts for test verification
#[derive(Default, Debug, Clone)]
pub struct CallCounts {
    pub execute: usize,
    pub login: usize,
    pub refresh: usize,
    pub logout: usize,
}

/// A captured dispatch for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRequest {
    /// Request path
    pub path: String,
    /// Access token the request carried
    pub token: Option<String>,
}

/// Build a token grant for tests
pub fn grant(access: &str, refresh: &str) -> TokenGrant {
    TokenGrant {
        access_token: access.to_string(),
        refresh_token: Some(refresh.to_string()),
        token_type: Some("bearer".to_string()),
    }
}

impl MockTransport {
    /// Create a mock that accepts no tokens and fails every refresh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as a valid access token.
    pub fn with_valid_token(self, token: &str) -> Self {
        lock(&self.valid_tokens).insert(token.to_string());
        self
    }

    /// Answer `path` with 403 for valid tokens.
    pub fn with_forbidden_path(self, path: &str) -> Self {
        lock(&self.forbidden_paths).insert(path.to_string());
        self
    }

    /// Fail `path` with a network error.
    pub fn with_offline_path(self, path: &str) -> Self {
        lock(&self.offline_paths).insert(path.to_string());
        self
    }

    /// Hold back 401 responses for `paths` until `gate` turns true.
    pub fn with_rejection_gate(self, paths: &[&str], gate: watch::Receiver<bool>) -> Self {
        let mut gates = lock(&self.rejection_gates);
        for path in paths {
            gates.insert(path.to_string(), gate.clone());
        }
        drop(gates);
        self
    }

    /// Hold refresh calls until `gate` turns true.
    pub fn with_refresh_gate(self, gate: watch::Receiver<bool>) -> Self {
        *lock(&self.refresh_gate) = Some(gate);
        self
    }

    /// Queue a successful refresh outcome.
    pub fn with_refresh_grant(self, grant: TokenGrant) -> Self {
        lock(&self.refresh_outcomes).push_back(Ok(grant));
        self
    }

    /// Queue a failed refresh outcome.
    pub fn with_refresh_error(self, error: ApiError) -> Self {
        lock(&self.refresh_outcomes).push_back(Err(error));
        self
    }

    /// Grant returned by login; without one login is rejected.
    pub fn with_login_grant(self, grant: TokenGrant) -> Self {
        *lock(&self.login_grant) = Some(grant);
        self
    }

    /// Make logout fail with `error`.
    pub fn with_logout_error(self, error: ApiError) -> Self {
        *lock(&self.logout_error) = Some(error);
        self
    }

    /// Get the call counts for verification in tests.
    pub fn call_counts(&self) -> CallCounts {
        lock(&self.call_count).clone()
    }

    /// Get all captured dispatches, in dispatch order.
    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        lock(&self.captured_requests).clone()
    }

    /// Captured dispatches that carried `token`.
    pub fn dispatched_with(&self, token: &str) -> Vec<String> {
        self.captured_requests()
            .into_iter()
            .filter(|c| c.token.as_deref() == Some(token))
            .map(|c| c.path)
            .collect()
    }

    fn capture_request(&self, request: &ApiRequest, token: Option<&str>) {
        lock(&self.captured_requests).push(CapturedRequest {
            path: request.path.clone(),
            token: token.map(str::to_string),
        });
        lock(&self.call_count).execute += 1;
    }
}

/// Test-only lock helper; a poisoned lock means a test already panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn wait_open(gate: Option<watch::Receiver<bool>>) {
    if let Some(mut gate) = gate {
        let _ = gate.wait_for(|open| *open).await;
    }
}

// ============================================================================
// DispatchApi Implementation
// ============================================================================

#[async_trait]
impl DispatchApi for MockTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> ApiResult<ApiResponse> {
        self.capture_request(request, access_token);

        if lock(&self.offline_paths).contains(&request.path) {
            return Err(ApiError::Network("Failed to connect to API".to_string()));
        }

        let accepted = access_token.is_some_and(|t| lock(&self.valid_tokens).contains(t));
        if !accepted {
            let gate = lock(&self.rejection_gates).get(&request.path).cloned();
            wait_open(gate).await;
            return Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "Token expired"));
        }

        if lock(&self.forbidden_paths).contains(&request.path) {
            return Ok(ApiResponse::new(StatusCode::FORBIDDEN, "Forbidden"));
        }

        let body = serde_json::json!({
            "method": request.method.as_str(),
            "path": request.path,
        });
        Ok(ApiResponse::new(StatusCode::OK, body.to_string()))
    }
}

// ============================================================================
// AuthApi Implementation
// ============================================================================

#[async_trait]
impl AuthApi for MockTransport {
    async fn login(&self, _email: &str, _password: &str) -> ApiResult<TokenGrant> {
        lock(&self.call_count).login += 1;
        lock(&self.login_grant)
            .clone()
            .ok_or(ApiError::InvalidCredentials)
    }

    async fn refresh(&self, _refresh_token: &str) -> ApiResult<TokenGrant> {
        lock(&self.call_count).refresh += 1;

        let gate = lock(&self.refresh_gate).clone();
        wait_open(gate).await;

        lock(&self.refresh_outcomes)
            .pop_front()
            .unwrap_or(Err(ApiError::Unauthorized))
    }

    async fn logout(&self, _credentials: &CredentialPair) -> ApiResult<()> {
        lock(&self.call_count).logout += 1;
        match lock(&self.logout_error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_accepts_only_valid_tokens() {
        let mock = MockTransport::new().with_valid_token("good");

        let ok = mock
            .execute(&ApiRequest::get("/projects"), Some("good"))
            .await
            .unwrap();
        let rejected = mock
            .execute(&ApiRequest::get("/projects"), Some("bad"))
            .await
            .unwrap();
        let anonymous = mock
            .execute(&ApiRequest::get("/projects"), None)
            .await
            .unwrap();

        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);
        assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
        assert_eq!(mock.call_counts().execute, 3);
    }

    #[tokio::test]
    async fn test_mock_refresh_outcomes_in_order() {
        let mock = MockTransport::new()
            .with_refresh_error(ApiError::Network("reset".to_string()))
            .with_refresh_grant(grant("a-2", "r-2"));

        assert!(matches!(
            mock.refresh("r-1").await,
            Err(ApiError::Network(_))
        ));
        assert_eq!(mock.refresh("r-1").await.unwrap().access_token, "a-2");
        assert!(matches!(
            mock.refresh("r-1").await,
            Err(ApiError::Unauthorized)
        ));
        assert_eq!(mock.call_counts().refresh, 3);
    }

    #[tokio::test]
    async fn test_mock_clones_share_state() {
        let mock = MockTransport::new();
        let clone = mock.clone();

        clone
            .execute(&ApiRequest::get("/a"), Some("t"))
            .await
            .unwrap();

        assert_eq!(mock.dispatched_with("t"), vec!["/a".to_string()]);
    }
}
