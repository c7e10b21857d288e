//! Periodic housekeeping: expired token purge and limiter eviction.

use std::sync::Arc;
use std::time::Duration;

use actix_web::rt::task::JoinHandle;
use actix_web::rt::time::interval;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use waitlist::domain::{FixedWindowRateLimiter, WaitlistQueueService};

/// Run one sweep.
pub(crate) async fn sweep(queue: &WaitlistQueueService, limiter: &FixedWindowRateLimiter) {
    match queue.tokens().purge_expired().await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "purged expired verification tokens"),
        Err(error) => warn!(%error, "expired token purge failed"),
    }
    let evicted = limiter.evict_stale().await;
    debug!(evicted, "evicted stale rate-limit windows");
}

/// Spawn the sweep loop on the current runtime.
pub(crate) fn spawn_maintenance(
    queue: Arc<WaitlistQueueService>,
    limiter: Arc<FixedWindowRateLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    actix_web::rt::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&queue, &limiter).await;
        }
    })
}
