//! Builders wiring adapters into the HTTP state.
//!
//! A database pool selects the Diesel adapters; without one the queue runs on
//! in-memory stores. Rate-limit counters are always process-local.

use std::io;
use std::sync::Arc;

use mockable::DefaultClock;
use tracing::{info, warn};

use waitlist::domain::ports::{
    EmailSender, PositionStore, RateLimitEvents, VerificationTokenRepository, WaitlistRepository,
};
use waitlist::domain::{FixedWindowRateLimiter, WaitlistPorts, WaitlistQueueService};
use waitlist::inbound::http::state::HttpState;
use waitlist::outbound::email::{HttpEmailSender, LoggingEmailSender};
use waitlist::outbound::memory::{
    InMemoryRateLimitStore, InMemoryVerificationTokenRepository, InMemoryWaitlistStore,
};
#[cfg(feature = "metrics")]
use waitlist::outbound::metrics::{FanOutRateLimitEvents, PrometheusRateLimitEvents};
use waitlist::outbound::metrics::TracingRateLimitEvents;
use waitlist::outbound::persistence::{DieselVerificationTokenRepository, DieselWaitlistStore};

use super::ServerConfig;

struct StoragePorts {
    positions: Arc<dyn PositionStore>,
    entries: Arc<dyn WaitlistRepository>,
    tokens: Arc<dyn VerificationTokenRepository>,
}

fn build_storage(config: &ServerConfig) -> StoragePorts {
    match &config.db_pool {
        Some(pool) => {
            let store = Arc::new(DieselWaitlistStore::new(pool.clone()));
            StoragePorts {
                positions: store.clone(),
                entries: store,
                tokens: Arc::new(DieselVerificationTokenRepository::new(pool.clone())),
            }
        }
        None => {
            warn!("no database configured; waitlist state lives in memory only");
            let store = Arc::new(InMemoryWaitlistStore::default());
            StoragePorts {
                positions: store.clone(),
                entries: store,
                tokens: Arc::new(InMemoryVerificationTokenRepository::default()),
            }
        }
    }
}

fn build_email_sender(config: &ServerConfig) -> io::Result<Arc<dyn EmailSender>> {
    match &config.email {
        Some(email) => {
            info!(endpoint = %email.endpoint, "sending email through provider API");
            let sender = HttpEmailSender::new(email.clone())
                .map_err(|e| io::Error::other(format!("email client setup failed: {e}")))?;
            Ok(Arc::new(sender))
        }
        None => {
            warn!("no email provider configured; verification emails are only logged");
            Ok(Arc::new(LoggingEmailSender))
        }
    }
}

/// Rate-limit event sink: abuse is always logged, and counted when a
/// Prometheus registry is available.
///
/// # Errors
/// Returns [`io::Error`] if Prometheus metric registration fails.
#[cfg(feature = "metrics")]
fn build_rate_limit_events(config: &ServerConfig) -> io::Result<Arc<dyn RateLimitEvents>> {
    match &config.prometheus {
        Some(prom) => {
            let counters = PrometheusRateLimitEvents::new(&prom.registry).map_err(|e| {
                io::Error::other(format!("rate-limit metrics registration failed: {e}"))
            })?;
            Ok(Arc::new(FanOutRateLimitEvents::new(vec![
                Arc::new(TracingRateLimitEvents),
                Arc::new(counters),
            ])))
        }
        None => Ok(Arc::new(TracingRateLimitEvents)),
    }
}

#[cfg(not(feature = "metrics"))]
fn build_rate_limit_events(_config: &ServerConfig) -> io::Result<Arc<dyn RateLimitEvents>> {
    Ok(Arc::new(TracingRateLimitEvents))
}

/// Assemble the queue service, limiter, and admin credentials.
///
/// # Errors
/// Propagates email client and metrics registration failures.
pub(crate) fn build_http_state(config: &ServerConfig) -> io::Result<HttpState> {
    let clock = Arc::new(DefaultClock);
    let storage = build_storage(config);
    let queue = WaitlistQueueService::new(
        WaitlistPorts {
            positions: storage.positions,
            entries: storage.entries,
            tokens: storage.tokens,
            email: build_email_sender(config)?,
        },
        clock.clone(),
        config.queue.clone(),
    );
    let limiter = FixedWindowRateLimiter::new(
        Arc::new(InMemoryRateLimitStore::default()),
        build_rate_limit_events(config)?,
        config.policies,
        clock,
    );
    if !config.admin.is_enabled() {
        warn!("no admin token configured; admin routes will reject every request");
    }
    Ok(HttpState::new(
        Arc::new(queue),
        Arc::new(limiter),
        config.admin.clone(),
    ))
}
