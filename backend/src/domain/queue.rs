//! Waitlist queue manager: signup, verification, admission, and removal.
//!
//! ## Invariants
//! - Only this service writes entry statuses; position integers change only
//!   through [`PositionStore`].
//! - A join either leaves a PENDING entry with a live token or leaves no
//!   active entry behind: a failed token issue compensates by removing the
//!   freshly placed entry and compacting the queue. A retry that finds the
//!   entry placed by its own timed-out attempt resumes from token issue.
//! - A verification token is spent only when its entry leaves PENDING; a
//!   store outage while promoting puts the token back.
//! - Referral credit is applied at most once per join, after the join can no
//!   longer be rolled back. Credit failures never fail the join.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mockable::Clock;
use rand::thread_rng;
use serde_json::json;
use tracing::{debug, error, info, warn};
use url::Url;

use super::ports::{
    EmailSender, EmailTemplate, ListQuery, PositionStore, PositionStoreError,
    VerificationTokenRepository, WaitlistRepository, WaitlistRepositoryError,
};
use super::{
    CreditOutcome, EmailAddress, EmailProviderEvent, EntryId, EntryStatus, IssuedToken,
    NewWaitlistEntry, Position, ReferralCode, ReferralCreditEngine, StorePolicy,
    VerificationTokenManager, WaitlistEntry, WaitlistError,
};

/// Fresh referral codes tried before a join gives up.
const REFERRAL_CODE_ATTEMPTS: u32 = 3;
/// Largest page an administrative listing returns.
pub const MAX_LIST_LIMIT: u32 = 200;

/// Outbound collaborators of the queue service.
pub struct WaitlistPorts {
    /// Owner of position integers.
    pub positions: Arc<dyn PositionStore>,
    /// Entry reads and in-queue status updates.
    pub entries: Arc<dyn WaitlistRepository>,
    /// Verification token storage.
    pub tokens: Arc<dyn VerificationTokenRepository>,
    /// Transactional email.
    pub email: Arc<dyn EmailSender>,
}

/// Tunables for the queue service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitlistConfig {
    /// Verification token lifetime in hours.
    pub verification_ttl_hours: u32,
    /// Link the raw token is appended to as `?token=`.
    pub verify_link_base: Url,
    /// Store deadlines and retry backoff.
    pub store_policy: StorePolicy,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The entry moved from PENDING to VERIFIED.
    Verified(WaitlistEntry),
    /// The entry was already past PENDING; nothing changed.
    AlreadyVerified(WaitlistEntry),
}

impl VerifyOutcome {
    /// Entry as it stands after the call.
    #[must_use]
    pub fn entry(&self) -> &WaitlistEntry {
        match self {
            Self::Verified(entry) | Self::AlreadyVerified(entry) => entry,
        }
    }
}

/// Public queue view for one email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    /// Current slot; `None` once the entry left the queue.
    pub position: Option<Position>,
    /// Lifecycle state.
    pub status: EntryStatus,
    /// Number of PENDING or VERIFIED entries.
    pub total_count: u64,
}

/// Orchestrates the waitlist over injected ports.
pub struct WaitlistQueueService {
    positions: Arc<dyn PositionStore>,
    entries: Arc<dyn WaitlistRepository>,
    email: Arc<dyn EmailSender>,
    tokens: VerificationTokenManager,
    referrals: ReferralCreditEngine,
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
}

impl WaitlistQueueService {
    /// Wire the service and its token and referral collaborators.
    pub fn new(ports: WaitlistPorts, clock: Arc<dyn Clock>, config: WaitlistConfig) -> Self {
        let policy = config.store_policy;
        let tokens = VerificationTokenManager::new(
            ports.tokens,
            ports.email.clone(),
            clock.clone(),
            config.verify_link_base,
            config.verification_ttl_hours,
            policy,
        );
        let referrals = ReferralCreditEngine::new(
            ports.positions.clone(),
            ports.entries.clone(),
            clock.clone(),
            policy,
        );
        Self {
            positions: ports.positions,
            entries: ports.entries,
            email: ports.email,
            tokens,
            referrals,
            clock,
            policy,
        }
    }

    /// Token manager, exposed for maintenance sweeps.
    #[must_use]
    pub fn tokens(&self) -> &VerificationTokenManager {
        &self.tokens
    }

    /// Put `raw_email` at the back of the queue.
    ///
    /// An unknown or malformed referral code is ignored. A valid code owned by
    /// a queued entry moves that entry up one slot.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::InvalidEmail`], [`WaitlistError::DuplicateEmail`], or
    /// [`WaitlistError::StoreUnavailable`] after one retry.
    pub async fn join(
        &self,
        raw_email: &str,
        referral_code: Option<&str>,
    ) -> Result<WaitlistEntry, WaitlistError> {
        let email = parse_email(raw_email)?;
        let referral = referral_code.and_then(|raw| match ReferralCode::parse(raw) {
            Ok(code) => Some(code),
            Err(error) => {
                debug!(%error, "ignoring malformed referral code");
                None
            }
        });

        let attempts = JoinAttempts::default();
        let (entry, issued, referrer) = self
            .policy
            .retry_once("join", || self.join_once(&email, referral.as_ref(), &attempts))
            .await?;

        if let Some(referrer) = referrer {
            self.credit_referrer(&referrer).await;
        }
        self.tokens.send_link(&entry.email, &issued).await;

        info!(entry = %entry.id, position = %entry.position, referred = entry.referred_by.is_some(), "join accepted");
        Ok(entry)
    }

    async fn join_once(
        &self,
        email: &EmailAddress,
        referral: Option<&ReferralCode>,
        attempts: &JoinAttempts,
    ) -> Result<(WaitlistEntry, IssuedToken, Option<WaitlistEntry>), WaitlistError> {
        let existing = self
            .policy
            .call(self.entries.find_live_by_email(email))
            .await?;
        let earlier = match existing {
            Some(entry) if attempts.placed(&entry.id) => {
                warn!(entry = %entry.id, "earlier join attempt committed after its deadline; resuming");
                Some(entry)
            }
            Some(_) => return Err(WaitlistError::DuplicateEmail),
            None => None,
        };

        let referrer = match referral {
            Some(code) => {
                self.policy
                    .call(self.entries.find_by_referral_code(code))
                    .await?
            }
            None => None,
        };
        let entry = match earlier {
            Some(entry) => entry,
            None => {
                self.place(
                    email,
                    referrer.as_ref().map(|r| r.referral_code.clone()),
                    attempts,
                )
                .await?
            }
        };

        match self.tokens.issue(email).await {
            Ok(issued) => Ok((entry, issued, referrer)),
            Err(error) => {
                warn!(entry = %entry.id, %error, "token issue failed; compensating join");
                self.compensate(&entry).await;
                Err(error)
            }
        }
    }

    async fn place(
        &self,
        email: &EmailAddress,
        referred_by: Option<ReferralCode>,
        attempts: &JoinAttempts,
    ) -> Result<WaitlistEntry, WaitlistError> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let candidate = NewWaitlistEntry {
                id: EntryId::random(),
                email: email.clone(),
                referral_code: ReferralCode::generate(&mut thread_rng()),
                referred_by: referred_by.clone(),
                created_at: self.clock.utc(),
            };
            attempts.record(candidate.id);
            match self
                .policy
                .call(self.positions.assign_next_position(&candidate))
                .await
            {
                Ok(entry) => return Ok(entry),
                Err(PositionStoreError::DuplicateReferralCode) => {
                    debug!("referral code collision; minting another");
                }
                Err(PositionStoreError::DuplicateEmail) => {
                    return self.adopt_late_commit(email, attempts).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
        Err(WaitlistError::store_unavailable(
            "could not mint a unique referral code",
        ))
    }

    /// An insert from a timed-out attempt may land while the retry runs.
    async fn adopt_late_commit(
        &self,
        email: &EmailAddress,
        attempts: &JoinAttempts,
    ) -> Result<WaitlistEntry, WaitlistError> {
        match self
            .policy
            .call(self.entries.find_live_by_email(email))
            .await?
        {
            Some(entry) if attempts.placed(&entry.id) => Ok(entry),
            _ => Err(WaitlistError::DuplicateEmail),
        }
    }

    async fn compensate(&self, entry: &WaitlistEntry) {
        let now = self.clock.utc();
        let removed = self
            .policy
            .call(self.positions.remove_and_compact(
                &entry.id,
                EntryStatus::Pending,
                EntryStatus::Deleted,
                now,
            ))
            .await;
        if let Err(error) = removed {
            error!(entry = %entry.id, %error, "compensation failed; entry left pending without a token");
        }
    }

    async fn credit_referrer(&self, referrer: &WaitlistEntry) {
        match self.referrals.apply_referral_credit(referrer).await {
            Ok(CreditOutcome::Promoted { .. }) => {}
            Ok(outcome) => debug!(referrer = %referrer.id, ?outcome, "referral credit skipped"),
            Err(error) => warn!(referrer = %referrer.id, %error, "referral credit failed"),
        }
    }

    /// Redeem a verification token and mark its entry VERIFIED.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::TokenInvalid`], [`WaitlistError::TokenExpired`], or
    /// [`WaitlistError::StoreUnavailable`] after one retry.
    pub async fn verify(&self, raw_token: &str) -> Result<VerifyOutcome, WaitlistError> {
        let record = self
            .policy
            .retry_once("verify.consume", || self.tokens.consume(raw_token))
            .await?;
        match self
            .policy
            .retry_once("verify.promote", || self.promote(&record.email))
            .await
        {
            Err(error) if error.is_transient() => {
                self.tokens.reinstate(&record).await;
                Err(error)
            }
            outcome => outcome,
        }
    }

    async fn promote(&self, email: &EmailAddress) -> Result<VerifyOutcome, WaitlistError> {
        let entry = self
            .policy
            .call(self.entries.find_live_by_email(email))
            .await?
            .ok_or(WaitlistError::TokenInvalid)?;

        match entry.status {
            EntryStatus::Pending => {}
            EntryStatus::Verified | EntryStatus::Invited => {
                return Ok(VerifyOutcome::AlreadyVerified(entry));
            }
            EntryStatus::Blocked | EntryStatus::Deleted => return Err(WaitlistError::TokenInvalid),
        }

        let now = self.clock.utc();
        let updated = self
            .policy
            .call(self.entries.update_status(
                &entry.id,
                EntryStatus::Pending,
                EntryStatus::Verified,
                now,
            ))
            .await;
        match updated {
            Ok(verified) => {
                info!(entry = %verified.id, "entry verified");
                Ok(VerifyOutcome::Verified(verified))
            }
            Err(WaitlistRepositoryError::StatusConflict {
                actual: EntryStatus::Verified | EntryStatus::Invited,
            }) => {
                let current = self
                    .policy
                    .call(self.entries.find_by_id(&entry.id))
                    .await?
                    .ok_or(WaitlistError::NotFound)?;
                Ok(VerifyOutcome::AlreadyVerified(current))
            }
            Err(WaitlistRepositoryError::StatusConflict { .. }) => Err(WaitlistError::TokenInvalid),
            Err(error) => Err(error.into()),
        }
    }

    /// Send a fresh verification link to a PENDING entry.
    ///
    /// Succeeds silently for unknown or already verified emails so the
    /// response never reveals waitlist membership.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::InvalidEmail`] or [`WaitlistError::StoreUnavailable`].
    pub async fn resend(&self, raw_email: &str) -> Result<(), WaitlistError> {
        let email = parse_email(raw_email)?;
        let entry = self
            .policy
            .call(self.entries.find_live_by_email(&email))
            .await?;
        match entry {
            Some(entry) if entry.status == EntryStatus::Pending => {
                let issued = self.tokens.resend(&email).await?;
                self.tokens.send_link(&email, &issued).await;
            }
            _ => debug!("resend requested for an email without a pending entry"),
        }
        Ok(())
    }

    /// Queue view for `raw_email`.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::InvalidEmail`], [`WaitlistError::NotFound`], or
    /// [`WaitlistError::StoreUnavailable`].
    pub async fn status(&self, raw_email: &str) -> Result<QueueStatus, WaitlistError> {
        let email = parse_email(raw_email)?;
        let entry = self
            .policy
            .call(self.entries.find_live_by_email(&email))
            .await?
            .ok_or(WaitlistError::NotFound)?;
        let total_count = self.policy.call(self.entries.count_active()).await?;
        Ok(QueueStatus {
            position: entry.active_position(),
            status: entry.status,
            total_count,
        })
    }

    /// Admit a VERIFIED entry and email the invitation.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::NotFound`], [`WaitlistError::InvalidTransition`] when
    /// the entry is not VERIFIED, or [`WaitlistError::StoreUnavailable`].
    pub async fn invite(&self, id: &EntryId) -> Result<WaitlistEntry, WaitlistError> {
        let invited = self.leave_queue(id, EntryStatus::Invited).await?;
        let data = json!({ "referralCode": invited.referral_code.as_str() });
        if let Err(error) = self
            .email
            .send(&invited.email, EmailTemplate::Invitation, &data)
            .await
        {
            warn!(entry = %invited.id, %error, "failed to send invitation email");
        }
        info!(entry = %invited.id, "entry invited");
        Ok(invited)
    }

    /// Block a queued entry.
    ///
    /// # Errors
    ///
    /// See [`Self::invite`].
    pub async fn block(&self, id: &EntryId) -> Result<WaitlistEntry, WaitlistError> {
        let blocked = self.leave_queue(id, EntryStatus::Blocked).await?;
        self.revoke_tokens(&blocked).await;
        info!(entry = %blocked.id, "entry blocked");
        Ok(blocked)
    }

    /// Delete a queued entry and close the gap it leaves.
    ///
    /// # Errors
    ///
    /// See [`Self::invite`].
    pub async fn remove(&self, id: &EntryId) -> Result<(), WaitlistError> {
        let removed = self.leave_queue(id, EntryStatus::Deleted).await?;
        self.revoke_tokens(&removed).await;
        info!(entry = %removed.id, "entry removed");
        Ok(())
    }

    async fn leave_queue(
        &self,
        id: &EntryId,
        next: EntryStatus,
    ) -> Result<WaitlistEntry, WaitlistError> {
        let entry = self
            .policy
            .call(self.entries.find_by_id(id))
            .await?
            .ok_or(WaitlistError::NotFound)?;
        let current = entry.status;
        current.transition_to(next)?;

        let now = self.clock.utc();
        self.policy
            .call(self.positions.remove_and_compact(id, current, next, now))
            .await
            .map_err(|error| match error {
                PositionStoreError::StatusConflict { actual } => WaitlistError::InvalidTransition {
                    from: actual,
                    to: next,
                },
                other => other.into(),
            })
    }

    async fn revoke_tokens(&self, entry: &WaitlistEntry) {
        if let Err(error) = self.tokens.revoke(&entry.email).await {
            warn!(entry = %entry.id, %error, "failed to revoke verification tokens");
        }
    }

    /// Administrative listing ordered by position.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::StoreUnavailable`].
    pub async fn list(&self, query: ListQuery) -> Result<Vec<WaitlistEntry>, WaitlistError> {
        let bounded = ListQuery {
            limit: query.limit.clamp(1, MAX_LIST_LIMIT),
            ..query
        };
        Ok(self.policy.call(self.entries.list(bounded)).await?)
    }

    /// React to a provider delivery event.
    ///
    /// Hard bounces delete the entry; complaints block it. Other events and
    /// unknown recipients are only logged.
    ///
    /// # Errors
    ///
    /// [`WaitlistError::StoreUnavailable`].
    pub async fn apply_email_event(&self, event: &EmailProviderEvent) -> Result<(), WaitlistError> {
        let Some(entry) = self
            .policy
            .call(self.entries.find_live_by_email(event.email()))
            .await?
        else {
            debug!(kind = event.kind(), "email event for unknown recipient");
            return Ok(());
        };

        let next = match event {
            EmailProviderEvent::Bounced { hard: true, .. } => EntryStatus::Deleted,
            EmailProviderEvent::Complained { .. } => EntryStatus::Blocked,
            EmailProviderEvent::Delivered { .. } | EmailProviderEvent::Bounced { .. } => {
                debug!(entry = %entry.id, kind = event.kind(), "email event recorded");
                return Ok(());
            }
        };

        if !entry.status.is_active() {
            debug!(entry = %entry.id, kind = event.kind(), status = %entry.status, "email event for inactive entry");
            return Ok(());
        }

        info!(entry = %entry.id, kind = event.kind(), "email event removes entry from queue");
        let applied = match next {
            EntryStatus::Blocked => self.block(&entry.id).await.map(|_| ()),
            _ => self.remove(&entry.id).await,
        };
        applied.or_else(|error| match error {
            WaitlistError::InvalidTransition { .. } | WaitlistError::NotFound => Ok(()),
            other => Err(other),
        })
    }
}

/// Entry ids minted by one `join` call across its retries.
#[derive(Default)]
struct JoinAttempts(Mutex<Vec<EntryId>>);

impl JoinAttempts {
    fn ids(&self) -> MutexGuard<'_, Vec<EntryId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, id: EntryId) {
        self.ids().push(id);
    }

    fn placed(&self, id: &EntryId) -> bool {
        self.ids().contains(id)
    }
}

fn parse_email(raw: &str) -> Result<EmailAddress, WaitlistError> {
    EmailAddress::parse(raw).map_err(|error| WaitlistError::InvalidEmail {
        message: error.to_string(),
    })
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
