//! Refresh state: the in-flight flag, the pending-request queue, and the
//! credential generation, all guarded by one lock in the pipeline.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::client::{ApiRequest, ApiResponse, ApiResult};
use crate::error::ApiError;

/// Receives the final outcome of a queued request
pub(crate) type Waiter = oneshot::Receiver<ApiResult<ApiResponse>>;

/// A request parked until the current refresh episode settles.
pub(crate) struct PendingRequest {
    pub request: ApiRequest,
    reply: oneshot::Sender<ApiResult<ApiResponse>>,
}

impl PendingRequest {
    /// Deliver the outcome. A caller that stopped waiting is ignored.
    pub fn resolve(self, outcome: ApiResult<ApiResponse>) {
        if self.reply.send(outcome).is_err() {
            log::debug!("Caller for {} went away before it settled", self.request);
        }
    }
}

#[derive(Default)]
pub(crate) struct RefreshState {
    in_flight: bool,
    queue: VecDeque<PendingRequest>,
    generation: u64,
}

impl RefreshState {
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
    }

    /// Bumped each time the credential pair is replaced or cleared
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Park a request at the back of the queue.
    pub fn enqueue(&mut self, request: ApiRequest, limit: usize) -> ApiResult<Waiter> {
        if self.queue.len() >= limit {
            return Err(ApiError::QueueFull(limit));
        }

        let (reply, waiter) = oneshot::channel();
        self.queue.push_back(PendingRequest { request, reply });
        Ok(waiter)
    }

    /// Mark a refresh as started. Returns false if one was already running,
    /// in which case the caller must not issue another.
    pub fn begin_refresh(&mut self) -> bool {
        !std::mem::replace(&mut self.in_flight, true)
    }

    /// Record that the stored credentials changed outside a refresh episode.
    pub fn rotate(&mut self) {
        self.generation += 1;
    }

    /// End the episode and hand back every parked request in enqueue order.
    pub fn settle(&mut self) -> Vec<PendingRequest> {
        self.in_flight = false;
        self.generation += 1;
        self.queue.drain(..).collect()
    }
}
