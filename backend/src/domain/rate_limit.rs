//! Fixed-window request throttling keyed by client and operation class.
//!
//! A window opens on the first request for a key and snaps shut once
//! `now - window_start` exceeds the window length; the next request reopens
//! it with a count of one. Bursts of up to twice the allowance are therefore
//! possible across a boundary.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use tracing::{debug, warn};

use super::ports::{AbuseEvent, RateLimitEvents, RateLimitStore};

const ANONYMOUS: &str = "anonymous";

/// Operation families throttled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Signups.
    Join,
    /// Token verification and resend.
    Verify,
    /// Position lookups.
    Status,
}

impl OperationClass {
    /// Label used in keys, logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Verify => "verify",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client identity used for throttling.
///
/// Anything that does not parse as an IP address collapses into the shared
/// `anonymous` key.
///
/// # Examples
/// ```
/// use waitlist::domain::ClientKey;
///
/// assert_eq!(ClientKey::resolve(Some(" 203.0.113.9 ")).as_str(), "203.0.113.9");
/// assert_eq!(ClientKey::resolve(Some("unknown")), ClientKey::anonymous());
/// assert_eq!(ClientKey::resolve(None), ClientKey::anonymous());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Key for a known client address.
    #[must_use]
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }

    /// Shared key for unidentifiable clients.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(ANONYMOUS.to_owned())
    }

    /// Resolve a raw address candidate.
    #[must_use]
    pub fn resolve(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse::<IpAddr>().ok())
            .map_or_else(Self::anonymous, Self::from_ip)
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Counter key: one window per client and operation class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// Client identity.
    pub client: ClientKey,
    /// Operation class.
    pub class: OperationClass,
}

impl RateLimitKey {
    /// Combine a client and an operation class.
    #[must_use]
    pub fn new(client: ClientKey, class: OperationClass) -> Self {
        Self { client, class }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client.as_str(), self.class)
    }
}

/// Allowance per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed per window.
    pub max: u32,
    /// Window length.
    pub window: TimeDelta,
}

impl RateLimitPolicy {
    /// Build a policy allowing `max` requests every `window_secs` seconds.
    #[must_use]
    pub fn per_seconds(max: u32, window_secs: u32) -> Self {
        Self {
            max,
            window: TimeDelta::seconds(i64::from(window_secs.max(1))),
        }
    }

    fn abuse_threshold(self) -> u32 {
        self.max.saturating_mul(2).saturating_add(1)
    }
}

/// Policies for every operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicies {
    /// Signup allowance.
    pub join: RateLimitPolicy,
    /// Verification and resend allowance.
    pub verify: RateLimitPolicy,
    /// Status lookup allowance.
    pub status: RateLimitPolicy,
}

impl RateLimitPolicies {
    /// Policy governing `class`.
    #[must_use]
    pub fn for_class(&self, class: OperationClass) -> RateLimitPolicy {
        match class {
            OperationClass::Join => self.join,
            OperationClass::Verify => self.verify,
            OperationClass::Status => self.status,
        }
    }

    /// Longest configured window.
    #[must_use]
    pub fn longest_window(&self) -> TimeDelta {
        self.join.window.max(self.verify.window).max(self.status.window)
    }
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            join: RateLimitPolicy::per_seconds(5, 60),
            verify: RateLimitPolicy::per_seconds(10, 900),
            status: RateLimitPolicy::per_seconds(30, 60),
        }
    }
}

/// State of one counter after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Requests seen in the current window, including this one.
    pub count: u32,
    /// Start of the current window.
    pub window_start: DateTime<Utc>,
}

impl WindowSnapshot {
    /// Apply one request at `now` to the previous state of a counter.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeDelta, TimeZone, Utc};
    /// use waitlist::domain::WindowSnapshot;
    ///
    /// let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("time");
    /// let window = TimeDelta::seconds(60);
    /// let first = WindowSnapshot::advance(None, start, window);
    /// let second = WindowSnapshot::advance(Some(first), start + TimeDelta::seconds(60), window);
    /// assert_eq!(second.count, 2);
    /// let reset = WindowSnapshot::advance(Some(second), start + TimeDelta::seconds(61), window);
    /// assert_eq!((reset.count, reset.window_start), (1, start + TimeDelta::seconds(61)));
    /// ```
    #[must_use]
    pub fn advance(previous: Option<Self>, now: DateTime<Utc>, window: TimeDelta) -> Self {
        match previous {
            Some(prev) if now.signed_duration_since(prev.window_start) <= window => Self {
                count: prev.count.saturating_add(1),
                window_start: prev.window_start,
            },
            _ => Self {
                count: 1,
                window_start: now,
            },
        }
    }
}

/// Outcome of a throttling check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the window.
    pub remaining: u32,
    /// When the current window closes.
    pub reset_at: DateTime<Utc>,
}

/// Fixed-window limiter over an injected counter store.
pub struct FixedWindowRateLimiter {
    store: Arc<dyn RateLimitStore>,
    events: Arc<dyn RateLimitEvents>,
    policies: RateLimitPolicies,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    /// Build a limiter.
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        events: Arc<dyn RateLimitEvents>,
        policies: RateLimitPolicies,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            events,
            policies,
            clock,
        }
    }

    /// Configured policies.
    #[must_use]
    pub fn policies(&self) -> &RateLimitPolicies {
        &self.policies
    }

    /// Count a request from `client` and decide whether it may proceed.
    ///
    /// Store failures fail open: throttling is best effort and must not take
    /// the waitlist down with it.
    pub async fn allow(&self, client: &ClientKey, class: OperationClass) -> RateLimitDecision {
        let policy = self.policies.for_class(class);
        let key = RateLimitKey::new(client.clone(), class);
        let now = self.clock.utc();

        let snapshot = match self.store.hit(&key, now, policy.window).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%key, %error, "rate-limit store failed; allowing request");
                return RateLimitDecision {
                    allowed: true,
                    remaining: policy.max,
                    reset_at: now + policy.window,
                };
            }
        };

        let decision = RateLimitDecision {
            allowed: snapshot.count <= policy.max,
            remaining: policy.max.saturating_sub(snapshot.count),
            reset_at: snapshot.window_start + policy.window,
        };

        if !decision.allowed {
            debug!(%key, count = snapshot.count, reset_at = %decision.reset_at, "rate limit exceeded");
            if let Err(error) = self.events.record_denied(class).await {
                warn!(%error, "failed to record rate-limit denial");
            }
        }

        if snapshot.count == policy.abuse_threshold() {
            warn!(%key, count = snapshot.count, limit = policy.max, "rate-limit abuse detected");
            let event = AbuseEvent {
                key,
                count: snapshot.count,
                limit: policy.max,
                window_start: snapshot.window_start,
            };
            if let Err(error) = self.events.record_abuse(&event).await {
                warn!(%error, "failed to record abuse event");
            }
        }

        decision
    }

    /// Drop counters whose windows have closed for every class.
    pub async fn evict_stale(&self) -> u64 {
        let cutoff = self.clock.utc() - self.policies.longest_window();
        match self.store.evict_before(cutoff).await {
            Ok(evicted) => evicted,
            Err(error) => {
                warn!(%error, "failed to evict stale rate-limit windows");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        MockRateLimitEvents, MockRateLimitStore, NoOpRateLimitEvents, RateLimitStoreError,
    };
    use crate::outbound::memory::InMemoryRateLimitStore;
    use crate::test_support::MutableClock;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid time")
    }

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::new(start()))
    }

    fn limiter(clock: Arc<MutableClock>, events: Arc<dyn RateLimitEvents>) -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::new(
            Arc::new(InMemoryRateLimitStore::default()),
            events,
            RateLimitPolicies::default(),
            clock,
        )
    }

    #[rstest]
    #[tokio::test]
    async fn sixth_join_in_window_is_denied(clock: Arc<MutableClock>) {
        let limiter = limiter(clock.clone(), Arc::new(NoOpRateLimitEvents));
        let client = ClientKey::resolve(Some("198.51.100.7"));

        for expected_remaining in (0..5).rev() {
            let decision = limiter.allow(&client, OperationClass::Join).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        clock.advance_seconds(30);
        let denied = limiter.allow(&client, OperationClass::Join).await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, start() + TimeDelta::seconds(60));
        assert!(denied.reset_at >= clock.utc());
    }

    #[rstest]
    #[tokio::test]
    async fn window_snaps_after_expiry(clock: Arc<MutableClock>) {
        let limiter = limiter(clock.clone(), Arc::new(NoOpRateLimitEvents));
        let client = ClientKey::anonymous();
        for _ in 0..6 {
            limiter.allow(&client, OperationClass::Join).await;
        }

        clock.advance_seconds(61);
        let decision = limiter.allow(&client, OperationClass::Join).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.reset_at, clock.utc() + TimeDelta::seconds(60));
    }

    #[rstest]
    #[tokio::test]
    async fn classes_and_clients_are_isolated(clock: Arc<MutableClock>) {
        let limiter = limiter(clock, Arc::new(NoOpRateLimitEvents));
        let noisy = ClientKey::resolve(Some("10.0.0.1"));
        for _ in 0..6 {
            limiter.allow(&noisy, OperationClass::Join).await;
        }

        let other_class = limiter.allow(&noisy, OperationClass::Status).await;
        let other_client = limiter
            .allow(&ClientKey::resolve(Some("10.0.0.2")), OperationClass::Join)
            .await;
        assert!(other_class.allowed);
        assert!(other_client.allowed);
    }

    #[rstest]
    #[tokio::test]
    async fn abuse_is_recorded_once_per_window(clock: Arc<MutableClock>) {
        let mut events = MockRateLimitEvents::new();
        events.expect_record_denied().times(7).returning(|_| Ok(()));
        events
            .expect_record_abuse()
            .times(1)
            .withf(|event| event.count == 11 && event.limit == 5)
            .returning(|_| Ok(()));
        let limiter = limiter(clock, Arc::new(events));
        let client = ClientKey::anonymous();

        for _ in 0..12 {
            limiter.allow(&client, OperationClass::Join).await;
        }
    }

    #[rstest]
    #[tokio::test]
    async fn store_failure_fails_open(clock: Arc<MutableClock>) {
        let mut store = MockRateLimitStore::new();
        store
            .expect_hit()
            .returning(|_, _, _| Err(RateLimitStoreError::unavailable("down")));
        let limiter = FixedWindowRateLimiter::new(
            Arc::new(store),
            Arc::new(NoOpRateLimitEvents),
            RateLimitPolicies::default(),
            clock,
        );

        let decision = limiter.allow(&ClientKey::anonymous(), OperationClass::Verify).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 10);
    }

    #[rstest]
    #[tokio::test]
    async fn eviction_uses_longest_window(clock: Arc<MutableClock>) {
        let mut store = MockRateLimitStore::new();
        let expected_cutoff = start() - TimeDelta::seconds(900);
        store
            .expect_evict_before()
            .withf(move |cutoff| *cutoff == expected_cutoff)
            .returning(|_| Ok(3));
        let limiter = FixedWindowRateLimiter::new(
            Arc::new(store),
            Arc::new(NoOpRateLimitEvents),
            RateLimitPolicies::default(),
            clock,
        );
        assert_eq!(limiter.evict_stale().await, 3);
    }

    #[rstest]
    #[case(Some("2001:db8::1"), "2001:db8::1")]
    #[case(Some("not-an-ip"), "anonymous")]
    #[case(Some(""), "anonymous")]
    #[case(None, "anonymous")]
    fn client_key_resolution(#[case] raw: Option<&str>, #[case] expected: &str) {
        assert_eq!(ClientKey::resolve(raw).as_str(), expected);
    }
}
