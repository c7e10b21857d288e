//! Verification token lifecycle: issue, consume, revoke, purge.
//!
//! ## Invariants
//! - At most one live token exists per email; issuing replaces older ones.
//! - A token is returned by [`VerificationTokenManager::consume`] at most
//!   once. Replays fail with [`WaitlistError::TokenInvalid`].
//! - An expired token is deleted by the consume that discovers it, so the
//!   next attempt reports `TokenInvalid` rather than `TokenExpired`.

use std::sync::Arc;

use chrono::{SecondsFormat, TimeDelta};
use mockable::Clock;
use rand::rngs::OsRng;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::ports::{EmailSender, EmailTemplate, VerificationTokenRepository};
use super::{
    EmailAddress, IssuedToken, StorePolicy, VerificationToken, VerificationTokenRecord,
    WaitlistError,
};

/// Token lifetime bounds in hours.
pub const MIN_TTL_HOURS: u32 = 1;
/// Upper bound for the token lifetime in hours.
pub const MAX_TTL_HOURS: u32 = 168;

/// Issues and redeems single-use verification tokens.
pub struct VerificationTokenManager {
    tokens: Arc<dyn VerificationTokenRepository>,
    email: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    link_base: Url,
    ttl: TimeDelta,
    policy: StorePolicy,
}

impl VerificationTokenManager {
    /// Build a manager; `ttl_hours` is clamped to `1..=168`.
    pub fn new(
        tokens: Arc<dyn VerificationTokenRepository>,
        email: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
        link_base: Url,
        ttl_hours: u32,
        policy: StorePolicy,
    ) -> Self {
        let hours = ttl_hours.clamp(MIN_TTL_HOURS, MAX_TTL_HOURS);
        Self {
            tokens,
            email,
            clock,
            link_base,
            ttl: TimeDelta::hours(i64::from(hours)),
            policy,
        }
    }

    /// Token lifetime.
    #[must_use]
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Replace any token bound to `email` with a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::StoreUnavailable`] when storage fails.
    pub async fn issue(&self, email: &EmailAddress) -> Result<IssuedToken, WaitlistError> {
        let now = self.clock.utc();
        let token = VerificationToken::generate(&mut OsRng);
        let record = VerificationTokenRecord {
            digest: token.digest(),
            email: email.clone(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.policy
            .call(self.tokens.replace_for_email(&record))
            .await?;
        debug!(expires_at = %record.expires_at, "verification token issued");
        Ok(IssuedToken {
            token,
            expires_at: record.expires_at,
        })
    }

    /// Issue a replacement token on explicit request.
    ///
    /// # Errors
    ///
    /// See [`Self::issue`].
    pub async fn resend(&self, email: &EmailAddress) -> Result<IssuedToken, WaitlistError> {
        let issued = self.issue(email).await?;
        info!("verification token re-issued");
        Ok(issued)
    }

    /// Redeem `raw` and return the stored record, which names the email the
    /// token was bound to.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::TokenInvalid`] for malformed, unknown, or replayed
    /// tokens; [`WaitlistError::TokenExpired`] when the deadline passed;
    /// [`WaitlistError::StoreUnavailable`] when storage fails.
    pub async fn consume(&self, raw: &str) -> Result<VerificationTokenRecord, WaitlistError> {
        let token = VerificationToken::parse(raw).map_err(|_| WaitlistError::TokenInvalid)?;
        let record = self
            .policy
            .call(self.tokens.take(&token.digest()))
            .await?
            .ok_or(WaitlistError::TokenInvalid)?;

        if record.is_expired(self.clock.utc()) {
            info!(expired_at = %record.expires_at, "verification token expired");
            return Err(WaitlistError::TokenExpired);
        }
        Ok(record)
    }

    /// Put back a consumed token whose verification could not complete.
    ///
    /// A token issued for the same email in the meantime wins. Failures are
    /// logged; the user can still request a fresh link.
    pub async fn reinstate(&self, record: &VerificationTokenRecord) {
        match self.policy.call(self.tokens.restore(record)).await {
            Ok(true) => info!(expires_at = %record.expires_at, "verification token reinstated"),
            Ok(false) => debug!("newer verification token exists; consumed token stays spent"),
            Err(error) => warn!(%error, "failed to reinstate verification token"),
        }
    }

    /// Drop every token bound to `email`.
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::StoreUnavailable`] when storage fails.
    pub async fn revoke(&self, email: &EmailAddress) -> Result<u64, WaitlistError> {
        Ok(self
            .policy
            .call(self.tokens.revoke_for_email(email))
            .await?)
    }

    /// Delete tokens that expired before now.
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::StoreUnavailable`] when storage fails.
    pub async fn purge_expired(&self) -> Result<u64, WaitlistError> {
        let now = self.clock.utc();
        Ok(self.policy.call(self.tokens.delete_expired(now)).await?)
    }

    /// Email the verification link. Failures are logged and swallowed.
    pub async fn send_link(&self, email: &EmailAddress, issued: &IssuedToken) {
        let mut link = self.link_base.clone();
        link.query_pairs_mut()
            .append_pair("token", issued.token.expose());
        let data = json!({
            "verifyUrl": link.as_str(),
            "expiresAt": issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        if let Err(error) = self
            .email
            .send(email, EmailTemplate::Verification, &data)
            .await
        {
            warn!(%error, "failed to send verification email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{EmailSendError, MockEmailSender};
    use crate::outbound::memory::InMemoryVerificationTokenRepository;
    use crate::test_support::MutableClock;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    struct Harness {
        clock: Arc<MutableClock>,
        tokens: Arc<InMemoryVerificationTokenRepository>,
        manager: VerificationTokenManager,
    }

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).expect("valid email")
    }

    fn build(sender: MockEmailSender, ttl_hours: u32) -> Harness {
        let now = Utc
            .with_ymd_and_hms(2026, 4, 1, 8, 0, 0)
            .single()
            .expect("valid time");
        let clock = Arc::new(MutableClock::new(now));
        let tokens = Arc::new(InMemoryVerificationTokenRepository::default());
        let manager = VerificationTokenManager::new(
            tokens.clone(),
            Arc::new(sender),
            clock.clone(),
            Url::parse("https://example.test/verify").expect("url"),
            ttl_hours,
            StorePolicy::default(),
        );
        Harness {
            clock,
            tokens,
            manager,
        }
    }

    #[fixture]
    fn harness() -> Harness {
        build(MockEmailSender::new(), 24)
    }

    #[rstest]
    #[tokio::test]
    async fn consume_succeeds_once(harness: Harness) {
        let address = email("a@x.com");
        let issued = harness.manager.issue(&address).await.expect("issue");

        let first = harness.manager.consume(issued.token.expose()).await;
        let second = harness.manager.consume(issued.token.expose()).await;

        assert_eq!(first.map(|record| record.email), Ok(address));
        assert_eq!(second, Err(WaitlistError::TokenInvalid));
    }

    #[rstest]
    #[tokio::test]
    async fn expired_token_is_removed_on_first_look(harness: Harness) {
        let issued = harness.manager.issue(&email("a@x.com")).await.expect("issue");
        harness.clock.advance_seconds(24 * 3600 + 1);

        let first = harness.manager.consume(issued.token.expose()).await;
        let second = harness.manager.consume(issued.token.expose()).await;

        assert_eq!(first, Err(WaitlistError::TokenExpired));
        assert_eq!(second, Err(WaitlistError::TokenInvalid));
        assert_eq!(harness.tokens.len(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn token_is_valid_at_exact_deadline(harness: Harness) {
        let issued = harness.manager.issue(&email("a@x.com")).await.expect("issue");
        harness.clock.advance_seconds(24 * 3600);
        assert!(harness.manager.consume(issued.token.expose()).await.is_ok());
    }

    #[rstest]
    #[tokio::test]
    async fn reissue_invalidates_previous_token(harness: Harness) {
        let address = email("a@x.com");
        let old = harness.manager.issue(&address).await.expect("issue");
        let new = harness.manager.resend(&address).await.expect("resend");

        assert_eq!(
            harness.manager.consume(old.token.expose()).await,
            Err(WaitlistError::TokenInvalid)
        );
        assert_eq!(
            harness
                .manager
                .consume(new.token.expose())
                .await
                .map(|record| record.email),
            Ok(address)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn reinstated_token_can_be_redeemed_again(harness: Harness) {
        let address = email("a@x.com");
        let issued = harness.manager.issue(&address).await.expect("issue");
        let record = harness
            .manager
            .consume(issued.token.expose())
            .await
            .expect("consume");

        harness.manager.reinstate(&record).await;

        assert_eq!(harness.tokens.len(), 1);
        assert!(harness.manager.consume(issued.token.expose()).await.is_ok());
    }

    #[rstest]
    #[tokio::test]
    async fn reinstate_yields_to_a_newer_token(harness: Harness) {
        let address = email("a@x.com");
        let old = harness.manager.issue(&address).await.expect("issue");
        let record = harness
            .manager
            .consume(old.token.expose())
            .await
            .expect("consume");
        let fresh = harness.manager.resend(&address).await.expect("resend");

        harness.manager.reinstate(&record).await;

        assert_eq!(
            harness.manager.consume(old.token.expose()).await,
            Err(WaitlistError::TokenInvalid)
        );
        assert!(harness.manager.consume(fresh.token.expose()).await.is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("not-a-token")]
    #[tokio::test]
    async fn malformed_tokens_are_invalid(harness: Harness, #[case] raw: &str) {
        assert_eq!(
            harness.manager.consume(raw).await,
            Err(WaitlistError::TokenInvalid)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn purge_removes_only_expired(harness: Harness) {
        harness.manager.issue(&email("old@x.com")).await.expect("issue");
        harness.clock.advance_seconds(20 * 3600);
        harness.manager.issue(&email("new@x.com")).await.expect("issue");
        harness.clock.advance_seconds(5 * 3600);

        assert_eq!(harness.manager.purge_expired().await, Ok(1));
        assert_eq!(harness.tokens.len(), 1);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(24, 24)]
    #[case(1000, 168)]
    fn ttl_is_clamped(#[case] requested: u32, #[case] expected_hours: i64) {
        let harness = build(MockEmailSender::new(), requested);
        assert_eq!(harness.manager.ttl(), TimeDelta::hours(expected_hours));
    }

    #[tokio::test]
    async fn send_link_embeds_token_and_swallows_failure() {
        let mut sender = MockEmailSender::new();
        sender
            .expect_send()
            .times(1)
            .withf(|to, template, data| {
                to.as_str() == "a@x.com"
                    && *template == EmailTemplate::Verification
                    && data["verifyUrl"]
                        .as_str()
                        .is_some_and(|url| url.starts_with("https://example.test/verify?token="))
            })
            .returning(|_, _, _| Err(EmailSendError::transport("smtp down")));
        let harness = build(sender, 24);
        let address = email("a@x.com");
        let issued = harness.manager.issue(&address).await.expect("issue");

        harness.manager.send_link(&address, &issued).await;
    }
}
