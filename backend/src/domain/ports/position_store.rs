//! Port owning queue position integers.
//!
//! Adapters serialise every mutation through their storage transaction (a row
//! lock or an equivalent compare-and-swap); callers never hold application
//! locks across these calls.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EntryId, EntryStatus, NewWaitlistEntry, Position, WaitlistEntry};

use super::define_port_error;

define_port_error! {
    /// Errors raised by position store adapters.
    pub enum PositionStoreError {
        /// Store connection could not be established or timed out.
        @transient Connection { message: String } => "position store connection failed: {message}",
        /// Query or mutation failed during execution.
        @transient Query { message: String } => "position store query failed: {message}",
        /// A non-deleted entry already uses the email.
        DuplicateEmail => "an entry with this email already exists",
        /// The freshly minted referral code collided with an existing one.
        DuplicateReferralCode => "referral code is already taken",
        /// The entry is no longer at the expected position or left the queue.
        PositionConflict { expected: Position } => "entry is no longer at position {expected}",
        /// The entry status changed since it was read.
        StatusConflict { actual: EntryStatus } => "entry status is now {actual}",
        /// No entry has the identifier.
        NotFound => "waitlist entry not found",
    }
}

/// Result of moving an entry one slot towards the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOutcome {
    /// The entry swapped places with its predecessor.
    Moved {
        /// New position of the promoted entry.
        to: Position,
        /// Entry pushed down into the vacated slot.
        displaced: EntryId,
    },
    /// The entry already holds position 1.
    AtHead,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Insert `entry` as PENDING at `count(active) + 1`.
    ///
    /// Concurrent callers never receive the same position.
    async fn assign_next_position(
        &self,
        entry: &NewWaitlistEntry,
    ) -> Result<WaitlistEntry, PositionStoreError>;

    /// Swap the entry at `expected` with the active entry at
    /// `max(1, expected - 1)` in a single transaction.
    ///
    /// Fails with [`PositionStoreError::PositionConflict`] when the entry is
    /// no longer active at `expected`.
    async fn shift_range(
        &self,
        entry_id: &EntryId,
        expected: Position,
        now: DateTime<Utc>,
    ) -> Result<ShiftOutcome, PositionStoreError>;

    /// Move an active entry from `expected` to the inactive status `next` and
    /// close the gap by decrementing every later active position.
    ///
    /// Fails with [`PositionStoreError::StatusConflict`] when the stored status
    /// is not `expected`.
    async fn remove_and_compact(
        &self,
        entry_id: &EntryId,
        expected: EntryStatus,
        next: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, PositionStoreError>;
}
