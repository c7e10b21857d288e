//! Read access to waitlist entries plus position-preserving status updates.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EmailAddress, EntryId, EntryStatus, ReferralCode, WaitlistEntry};

use super::define_port_error;

define_port_error! {
    /// Errors raised by waitlist repository adapters.
    pub enum WaitlistRepositoryError {
        /// Repository connection could not be established or timed out.
        @transient Connection { message: String } => "waitlist repository connection failed: {message}",
        /// Query or mutation failed during execution.
        @transient Query { message: String } => "waitlist repository query failed: {message}",
        /// The entry status changed since it was read.
        StatusConflict { actual: EntryStatus } => "entry status is now {actual}",
        /// No entry has the identifier.
        NotFound => "waitlist entry not found",
    }
}

/// Paging window for administrative listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    /// Entries to skip.
    pub offset: u32,
    /// Maximum entries to return.
    pub limit: u32,
    /// Include INVITED, BLOCKED and DELETED entries after the active queue.
    pub include_inactive: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
            include_inactive: false,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WaitlistRepository: Send + Sync {
    /// Fetch an entry by identifier.
    async fn find_by_id(&self, id: &EntryId)
    -> Result<Option<WaitlistEntry>, WaitlistRepositoryError>;

    /// Fetch the non-deleted entry registered under `email`.
    async fn find_live_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError>;

    /// Fetch the entry that owns `code`, whatever its status.
    async fn find_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError>;

    /// Number of PENDING or VERIFIED entries.
    async fn count_active(&self) -> Result<u64, WaitlistRepositoryError>;

    /// Active entries by position, then (optionally) inactive entries by
    /// last update.
    async fn list(&self, query: ListQuery) -> Result<Vec<WaitlistEntry>, WaitlistRepositoryError>;

    /// Compare-and-set a status change that keeps the entry in the queue.
    async fn update_status(
        &self,
        id: &EntryId,
        expected: EntryStatus,
        next: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, WaitlistRepositoryError>;
}
