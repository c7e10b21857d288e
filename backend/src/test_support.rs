//! Test utilities for the waitlist crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`);
//! compiled only for tests or with the `test-support` feature.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use serde_json::Value;
use url::Url;

use crate::domain::ports::{
    EmailSendError, EmailSender, EmailTemplate, NoOpRateLimitEvents, WaitlistRepository,
};
use crate::domain::{
    EmailAddress, FixedWindowRateLimiter, RateLimitPolicies, StorePolicy, WaitlistConfig,
    WaitlistPorts, WaitlistQueueService,
};
use crate::outbound::memory::{
    InMemoryRateLimitStore, InMemoryVerificationTokenRepository, InMemoryWaitlistStore,
};

/// Clock whose time only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Freeze the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move time forward by `seconds`.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Fixed instant used as "now" by default.
pub fn epoch() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single() {
        Some(instant) => instant,
        None => panic!("fixture instant is valid"),
    }
}

/// An email captured by [`RecordingEmailSender`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    /// Recipient.
    pub to: EmailAddress,
    /// Template used.
    pub template: EmailTemplate,
    /// Template data.
    pub data: Value,
}

impl SentEmail {
    /// Raw token from the verification link, if this email carries one.
    pub fn verification_token(&self) -> Option<String> {
        let link = Url::parse(self.data.get("verifyUrl")?.as_str()?).ok()?;
        link.query_pairs()
            .find(|(name, _)| name == "token")
            .map(|(_, value)| value.into_owned())
    }
}

/// Email sender that records every message and never fails.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    /// Copies of everything sent so far.
    pub fn sent(&self) -> Vec<SentEmail> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(_) => panic!("sent mutex"),
        }
    }

    /// Token from the most recent verification email to `to`.
    pub fn last_token_for(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .filter(|mail| mail.to.as_str() == to && mail.template == EmailTemplate::Verification)
            .find_map(|mail| mail.verification_token())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(
        &self,
        to: &EmailAddress,
        template: EmailTemplate,
        data: &Value,
    ) -> Result<(), EmailSendError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(SentEmail {
                to: to.clone(),
                template,
                data: data.clone(),
            }),
            Err(_) => panic!("sent mutex"),
        }
        Ok(())
    }
}

/// Queue service wired to in-memory adapters, with handles for assertions.
pub struct InMemoryWaitlist {
    /// Service under test.
    pub service: Arc<WaitlistQueueService>,
    /// Shared entry store.
    pub store: Arc<InMemoryWaitlistStore>,
    /// Shared token store.
    pub tokens: Arc<InMemoryVerificationTokenRepository>,
    /// Captured outbound email.
    pub outbox: Arc<RecordingEmailSender>,
    /// Controllable time source.
    pub clock: Arc<MutableClock>,
}

impl InMemoryWaitlist {
    /// Build a waitlist with a 24 hour token lifetime and no retry delay.
    pub fn new() -> Self {
        let store = Arc::new(InMemoryWaitlistStore::default());
        let tokens = Arc::new(InMemoryVerificationTokenRepository::default());
        let outbox = Arc::new(RecordingEmailSender::default());
        let clock = Arc::new(MutableClock::new(epoch()));
        let link_base = match Url::parse("http://localhost:8080/verify") {
            Ok(url) => url,
            Err(error) => panic!("fixture url: {error}"),
        };
        let service = WaitlistQueueService::new(
            WaitlistPorts {
                positions: store.clone(),
                entries: store.clone(),
                tokens: tokens.clone(),
                email: outbox.clone(),
            },
            clock.clone(),
            WaitlistConfig {
                verification_ttl_hours: 24,
                verify_link_base: link_base,
                store_policy: StorePolicy {
                    timeout: Duration::from_secs(5),
                    retry_backoff: Duration::ZERO,
                },
            },
        );
        Self {
            service: Arc::new(service),
            store,
            tokens,
            outbox,
            clock,
        }
    }

    /// Rate limiter with default policies on the shared clock.
    pub fn limiter(&self) -> FixedWindowRateLimiter {
        self.limiter_with(RateLimitPolicies::default())
    }

    /// Rate limiter with `policies` on the shared clock.
    pub fn limiter_with(&self, policies: RateLimitPolicies) -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::new(
            Arc::new(InMemoryRateLimitStore::default()),
            Arc::new(NoOpRateLimitEvents),
            policies,
            self.clock.clone(),
        )
    }

    /// Positions of active entries keyed by email, ordered by position.
    pub async fn active_positions(&self) -> Vec<(String, u32)> {
        let query = crate::domain::ports::ListQuery {
            offset: 0,
            limit: u32::MAX,
            include_inactive: false,
        };
        match self.store.list(query).await {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| (entry.email.to_string(), entry.position.get()))
                .collect(),
            Err(error) => panic!("list entries: {error}"),
        }
    }
}

impl Default for InMemoryWaitlist {
    fn default() -> Self {
        Self::new()
    }
}
