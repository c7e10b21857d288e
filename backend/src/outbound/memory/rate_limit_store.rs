//! Sharded concurrent map of fixed-window counters.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::domain::ports::{RateLimitStore, RateLimitStoreError};
use crate::domain::{RateLimitKey, WindowSnapshot};

/// Counter store with per-key locking; unrelated keys never contend.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<RateLimitKey, WindowSnapshot>,
}

impl InMemoryRateLimitStore {
    /// Number of tracked windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no window is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<WindowSnapshot, RateLimitStoreError> {
        let snapshot = match self.windows.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let next = WindowSnapshot::advance(Some(*slot.get()), now, window);
                slot.insert(next);
                next
            }
            Entry::Vacant(slot) => {
                let next = WindowSnapshot::advance(None, now, window);
                slot.insert(next);
                next
            }
        };
        Ok(snapshot)
    }

    async fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RateLimitStoreError> {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.window_start >= cutoff);
        let evicted = before.saturating_sub(self.windows.len());
        Ok(u64::try_from(evicted).unwrap_or(u64::MAX))
    }
}
