//! Reactive rate limiting for backend calls
//!
//! Limiting stays off until the backend answers 429 for an endpoint category;
//! from then on requests in that category are paced.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;

/// Categories of backend endpoints with separate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// /auth/* - login, refresh, logout
    Auth,
    /// Everything else
    Resource,
}

impl EndpointCategory {
    /// Categorize a request by its path (without the host).
    pub fn from_path(path: &str) -> Self {
        let path = path.strip_prefix("/api").unwrap_or(path);
        if path == "/auth" || path.starts_with("/auth/") {
            EndpointCategory::Auth
        } else {
            EndpointCategory::Resource
        }
    }

    /// Requests per second once limiting is active.
    pub fn rate_limit(&self) -> u32 {
        match self {
            EndpointCategory::Auth => 2,
            EndpointCategory::Resource => 10,
        }
    }
}

/// Rate limiter for a single endpoint category.
pub struct EndpointRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    active: AtomicBool,
    category: EndpointCategory,
}

impl EndpointRateLimiter {
    pub fn new(category: EndpointCategory) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(category.rate_limit()).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: RateLimiter::direct(quota),
            active: AtomicBool::new(false),
            category,
        }
    }

    /// Activate rate limiting for this category.
    pub fn activate(&self) {
        let was_active = self.active.swap(true, Ordering::SeqCst);
        if !was_active {
            debug!("Rate limiting activated for {:?}", self.category);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for permission if rate limiting is active.
    pub async fn wait_if_active(&self) {
        if self.is_active() {
            debug!("Waiting for rate limiter {:?}", self.category);
            self.limiter.until_ready().await;
        }
    }
}

/// Limiters for every endpoint category.
pub struct RateLimiterSet {
    auth: EndpointRateLimiter,
    resource: EndpointRateLimiter,
}

impl Default for RateLimiterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterSet {
    pub fn new() -> Self {
        Self {
            auth: EndpointRateLimiter::new(EndpointCategory::Auth),
            resource: EndpointRateLimiter::new(EndpointCategory::Resource),
        }
    }

    fn get(&self, category: EndpointCategory) -> &EndpointRateLimiter {
        match category {
            EndpointCategory::Auth => &self.auth,
            EndpointCategory::Resource => &self.resource,
        }
    }

    /// Wait for rate limit permission for a category (if active).
    pub async fn wait_for(&self, category: EndpointCategory) {
        self.get(category).wait_if_active().await;
    }

    /// Activate rate limiting for a category (called on 429).
    pub fn activate(&self, category: EndpointCategory) {
        self.get(category).activate();
    }

    #[cfg(test)]
    pub fn is_active(&self, category: EndpointCategory) -> bool {
        self.get(category).is_active()
    }
}
