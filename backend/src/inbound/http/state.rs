//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they depend only
//! on domain services and stay testable without I/O.

use std::sync::Arc;

use crate::domain::{FixedWindowRateLimiter, WaitlistQueueService};

use super::auth::AdminCredentials;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Queue operations.
    pub queue: Arc<WaitlistQueueService>,
    /// Per-client throttling for public endpoints.
    pub limiter: Arc<FixedWindowRateLimiter>,
    /// Expected admin bearer token.
    pub admin: AdminCredentials,
}

impl HttpState {
    /// Bundle the services handlers need.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use waitlist::inbound::http::auth::AdminCredentials;
    /// use waitlist::inbound::http::state::HttpState;
    /// use waitlist::test_support::InMemoryWaitlist;
    ///
    /// let waitlist = InMemoryWaitlist::new();
    /// let state = HttpState::new(
    ///     waitlist.service.clone(),
    ///     Arc::new(waitlist.limiter()),
    ///     AdminCredentials::disabled(),
    /// );
    /// assert!(!state.admin.is_enabled());
    /// ```
    pub fn new(
        queue: Arc<WaitlistQueueService>,
        limiter: Arc<FixedWindowRateLimiter>,
        admin: AdminCredentials,
    ) -> Self {
        Self {
            queue,
            limiter,
            admin,
        }
    }
}
