//! Referral credit: move a referrer one slot towards the head of the queue.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info, warn};

use super::ports::{PositionStore, PositionStoreError, ShiftOutcome, WaitlistRepository};
use super::{EntryId, EntryStatus, Position, StorePolicy, WaitlistEntry, WaitlistError};

/// Attempts at the conditional swap before a credit is dropped.
pub const MAX_CREDIT_ATTEMPTS: u32 = 3;

/// What happened to one credit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// The referrer swapped places with the entry ahead of it.
    Promoted {
        /// Position before the swap.
        from: Position,
        /// Position after the swap.
        to: Position,
        /// Entry moved down one slot.
        displaced: EntryId,
    },
    /// The referrer already holds position 1.
    AlreadyFirst,
    /// The referrer has left the queue.
    Ineligible(EntryStatus),
    /// The referrer kept moving concurrently; the credit was given up.
    Dropped,
}

/// Applies one-slot promotions through the position store.
pub struct ReferralCreditEngine {
    positions: Arc<dyn PositionStore>,
    entries: Arc<dyn WaitlistRepository>,
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
}

impl ReferralCreditEngine {
    /// Build an engine.
    pub fn new(
        positions: Arc<dyn PositionStore>,
        entries: Arc<dyn WaitlistRepository>,
        clock: Arc<dyn Clock>,
        policy: StorePolicy,
    ) -> Self {
        Self {
            positions,
            entries,
            clock,
            policy,
        }
    }

    /// Move `referrer` to `max(1, position - 1)`, displacing the entry there.
    ///
    /// Must be called at most once per referral event. A swap whose
    /// precondition fails is retried against a fresh read of the referrer.
    ///
    /// # Errors
    ///
    /// Returns [`WaitlistError::StoreUnavailable`] on storage failure and
    /// [`WaitlistError::NotFound`] when the referrer vanished.
    pub async fn apply_referral_credit(
        &self,
        referrer: &WaitlistEntry,
    ) -> Result<CreditOutcome, WaitlistError> {
        let mut current = referrer.clone();
        for attempt in 1..=MAX_CREDIT_ATTEMPTS {
            if !current.status.is_active() {
                debug!(referrer = %current.id, status = %current.status, "referrer not eligible for credit");
                return Ok(CreditOutcome::Ineligible(current.status));
            }

            let now = self.clock.utc();
            let shifted = self
                .policy
                .call(self.positions.shift_range(&current.id, current.position, now))
                .await;
            match shifted {
                Ok(ShiftOutcome::Moved { to, displaced }) => {
                    info!(referrer = %current.id, from = %current.position, %to, "referral credit applied");
                    return Ok(CreditOutcome::Promoted {
                        from: current.position,
                        to,
                        displaced,
                    });
                }
                Ok(ShiftOutcome::AtHead) => {
                    debug!(referrer = %current.id, "referrer already first");
                    return Ok(CreditOutcome::AlreadyFirst);
                }
                Err(PositionStoreError::PositionConflict { expected }) => {
                    debug!(referrer = %current.id, %expected, attempt, "referrer moved; re-reading");
                    current = self
                        .policy
                        .call(self.entries.find_by_id(&current.id))
                        .await?
                        .ok_or(WaitlistError::NotFound)?;
                }
                Err(error) => return Err(error.into()),
            }
        }

        warn!(referrer = %current.id, attempts = MAX_CREDIT_ATTEMPTS, "referral credit dropped after repeated conflicts");
        Ok(CreditOutcome::Dropped)
    }
}
