//! Port for per-key fixed-window counters.
//!
//! Counters are per process and best effort; adapters only need per-key
//! atomicity.
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{RateLimitKey, WindowSnapshot};

use super::define_port_error;

define_port_error! {
    /// Errors raised by rate-limit store adapters.
    pub enum RateLimitStoreError {
        /// The counter backend is unavailable.
        @transient Unavailable { message: String } => "rate-limit store unavailable: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` and return the updated window.
    ///
    /// Implementations apply [`WindowSnapshot::advance`] atomically per key.
    async fn hit(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<WindowSnapshot, RateLimitStoreError>;

    /// Forget windows opened before `cutoff`.
    async fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RateLimitStoreError>;
}
