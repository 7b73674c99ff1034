//! Token-aware request pipeline
//!
//! [`TokenPipeline`] attaches the stored access token to every request. When
//! the backend answers 401 it runs a single refresh for everyone: the first
//! rejected request starts a refresh episode, every other request that is
//! rejected (or simply arrives) while it runs is parked behind it, and once
//! the episode settles the parked requests are either replayed once with the
//! new token, in the order they were parked, or all failed together.
//!
//! The pipeline is an explicit handle: construct one, clone it into whatever
//! needs to make calls. Clones share state.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use reqwest::StatusCode;
use tokio::sync::{Mutex, broadcast};

use crate::client::{ApiRequest, ApiResponse, ApiResult, Transport};
use crate::credentials::{CredentialPair, CredentialStore};
use crate::error::ApiError;

mod queue;

use queue::{PendingRequest, RefreshState, Waiter};

/// Upper bound on a single refresh call
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh calls per episode
pub const DEFAULT_REFRESH_ATTEMPTS: u32 = 1;

/// Requests that may wait on one refresh episode
pub const DEFAULT_MAX_QUEUE: usize = 256;

/// Capacity of the session event channel
const EVENT_CAPACITY: usize = 16;

/// Bounds applied to refresh episodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Timeout for each refresh call
    pub refresh_timeout: Duration,

    /// Refresh calls per episode. Only network failures and timeouts are
    /// retried; an error status from the refresh endpoint ends the episode.
    pub refresh_attempts: u32,

    /// Maximum number of requests parked behind one refresh
    pub max_queue: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refresh_attempts: DEFAULT_REFRESH_ATTEMPTS,
            max_queue: DEFAULT_MAX_QUEUE,
        }
    }
}

/// Session lifecycle notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// `login` stored a new credential pair
    LoggedIn,
    /// A refresh episode replaced the credential pair
    Refreshed,
    /// A refresh episode failed; the session is gone and the user must log in again
    Expired,
    /// `logout` cleared the credential pair
    LoggedOut,
}

/// Shared handle to the pipeline
pub struct TokenPipeline<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TokenPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    transport: T,
    store: Box<dyn CredentialStore>,
    settings: PipelineSettings,
    /// Guards the in-flight flag and the queue; credential reads and writes
    /// also happen while holding it.
    state: Mutex<RefreshState>,
    events: broadcast::Sender<SessionEvent>,
}

impl<T: Transport + 'static> TokenPipeline<T> {
    /// Create a pipeline over `transport`, reading and writing credentials through `store`.
    pub fn new(transport: T, store: Box<dyn CredentialStore>, settings: PipelineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                settings,
                state: Mutex::new(RefreshState::default()),
                events,
            }),
        }
    }

    /// Listen for session events (e.g. to send the user back to login on `Expired`).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the stored credential pair
    pub async fn credentials(&self) -> ApiResult<Option<CredentialPair>> {
        let _state = self.inner.state.lock().await;
        Ok(self.inner.store.load()?)
    }

    /// Number of requests waiting on a refresh
    #[allow(dead_code)]
    pub async fn queued(&self) -> usize {
        self.inner.state.lock().await.len()
    }

    /// Send a request with the current access token, refreshing credentials
    /// and replaying the request if the backend rejects the token.
    ///
    /// 403 becomes [`ApiError::Forbidden`]; any other status is returned as is.
    pub async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let (access_token, generation) = {
            let mut state = self.inner.state.lock().await;
            if state.is_refreshing() {
                debug!("Refresh in flight, holding {}", request);
                let waiter = state.enqueue(request, self.inner.settings.max_queue)?;
                drop(state);
                return settle(waiter).await;
            }
            (self.inner.access_token()?, state.generation())
        };

        debug!("Dispatching {}", request);
        let response = self
            .inner
            .transport
            .execute(&request, access_token.as_deref())
            .await?;

        match response.status {
            StatusCode::UNAUTHORIZED => self.recover(request, generation).await,
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            _ => Ok(response),
        }
    }

    /// Handle a 401 for `request`, which was dispatched at `seen_generation`.
    async fn recover(&self, request: ApiRequest, seen_generation: u64) -> ApiResult<ApiResponse> {
        let mut state = self.inner.state.lock().await;

        if !state.is_refreshing() && state.generation() != seen_generation {
            // A refresh finished after this request went out with the old token.
            let access_token = self.inner.access_token()?;
            drop(state);

            let Some(access_token) = access_token else {
                return Err(ApiError::SessionExpired);
            };
            debug!("Credentials replaced since dispatch, replaying {}", request);
            return self.inner.replay(&request, Some(access_token.as_str())).await;
        }

        debug!("Access token rejected for {}, queueing", request);
        let waiter = state.enqueue(request, self.inner.settings.max_queue)?;

        if state.begin_refresh() {
            // A failed read still has to go through the episode to settle the queue.
            let refresh_token = self
                .inner
                .store
                .load()
                .map_err(ApiError::from)
                .and_then(|pair| {
                    pair.map(|pair| pair.refresh_token)
                        .ok_or(ApiError::SessionExpired)
                });
            let inner = Arc::clone(&self.inner);
            tokio::spawn(inner.run_episode(refresh_token, state.generation()));
        }
        drop(state);

        settle(waiter).await
    }

    /// Log in and store the returned credential pair.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<CredentialPair> {
        let grant = self.inner.transport.login(email, password).await?;
        let pair = CredentialPair::from_grant(grant, None)?;

        {
            let mut state = self.inner.state.lock().await;
            self.inner.store.save(&pair)?;
            state.rotate();
        }

        info!("Logged in as {}", email);
        self.inner.emit(SessionEvent::LoggedIn);
        Ok(pair)
    }

    /// Clear the stored credentials and tell the backend to revoke them.
    ///
    /// The backend call is best effort: failures are logged and the local
    /// session is cleared regardless.
    pub async fn logout(&self) -> ApiResult<()> {
        let previous = {
            let mut state = self.inner.state.lock().await;
            let previous = self.inner.store.load()?;
            self.inner.store.clear()?;
            state.rotate();
            previous
        };

        if let Some(pair) = previous
            && let Err(err) = self.inner.transport.logout(&pair).await
        {
            warn!("Server-side logout failed: {}", err);
        }

        info!("Logged out");
        self.inner.emit(SessionEvent::LoggedOut);
        Ok(())
    }
}

impl<T: Transport + 'static> Inner<T> {
    /// Must be called with the state lock held.
    fn access_token(&self) -> ApiResult<Option<String>> {
        Ok(self.store.load()?.map(|pair| pair.access_token))
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Refresh, store the outcome, and settle every parked request.
    ///
    /// `started_at` is the generation when the episode began. If `login` or
    /// `logout` replaced the pair in the meantime, the refreshed pair is
    /// discarded and parked requests follow the current session instead.
    async fn run_episode(self: Arc<Self>, refresh_token: ApiResult<String>, started_at: u64) {
        info!("Access token rejected, refreshing credentials");
        let outcome = match refresh_token {
            Ok(refresh_token) => self.refresh_credentials(&refresh_token).await,
            Err(err) => Err(err),
        };

        let mut state = self.state.lock().await;
        let superseded = state.generation() != started_at;
        let outcome = if superseded {
            debug!("Session replaced during refresh, discarding refreshed credentials");
            match self.store.load() {
                Ok(Some(pair)) => Ok(pair),
                Ok(None) => Err(ApiError::SessionExpired),
                Err(err) => Err(err.into()),
            }
        } else {
            let outcome = outcome
                .and_then(|pair| self.store.save(&pair).map(|_| pair).map_err(ApiError::from));
            if outcome.is_err()
                && let Err(err) = self.store.clear()
            {
                warn!("Failed to clear credentials: {}", err);
            }
            outcome
        };
        let pending = state.settle();
        drop(state);

        match outcome {
            Ok(pair) => {
                info!("Credentials refreshed, replaying {} request(s)", pending.len());
                if !superseded {
                    self.emit(SessionEvent::Refreshed);
                }
                self.replay_all(pending, &pair.access_token).await;
            }
            Err(err) => {
                warn!(
                    "Credential refresh failed: {}; failing {} request(s)",
                    err,
                    pending.len()
                );
                if !superseded {
                    self.emit(SessionEvent::Expired);
                }
                for request in pending {
                    request.resolve(Err(ApiError::SessionExpired));
                }
            }
        }
    }

    async fn refresh_credentials(&self, refresh_token: &str) -> ApiResult<CredentialPair> {
        let attempts = self.settings.refresh_attempts.max(1);

        let mut attempt = 1;
        loop {
            let call = self.transport.refresh(refresh_token);
            let err = match tokio::time::timeout(self.settings.refresh_timeout, call).await {
                Ok(Ok(grant)) => return CredentialPair::from_grant(grant, Some(refresh_token)),
                Ok(Err(err @ ApiError::Network(_))) => err,
                Ok(Err(err)) => return Err(err),
                Err(_) => ApiError::Network(format!(
                    "Credential refresh timed out after {:?}",
                    self.settings.refresh_timeout
                )),
            };

            if attempt >= attempts {
                return Err(err);
            }
            warn!("Refresh attempt {}/{} failed: {}", attempt, attempts, err);
            attempt += 1;
        }
    }

    /// Replay parked requests with the new token. Dispatches start in queue order.
    async fn replay_all(&self, pending: Vec<PendingRequest>, access_token: &str) {
        let replays = pending.into_iter().map(|pending| async move {
            let outcome = self.replay(&pending.request, Some(access_token)).await;
            pending.resolve(outcome);
        });
        join_all(replays).await;
    }

    /// Dispatch once more. No further refresh: a 401 here is final.
    async fn replay(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> ApiResult<ApiResponse> {
        let response = self.transport.execute(request, access_token).await?;
        match response.status {
            StatusCode::UNAUTHORIZED => {
                warn!("{} rejected again after refresh", request);
                Err(ApiError::Unauthorized)
            }
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            _ => Ok(response),
        }
    }
}

/// Wait for a parked request's outcome.
async fn settle(waiter: Waiter) -> ApiResult<ApiResponse> {
    // The sender only disappears if the episode task died.
    waiter.await.unwrap_or(Err(ApiError::SessionExpired))
}
