//! Diesel error mapping for the waitlist adapters.
//!
//! Unique violations are told apart by constraint name, so the names below
//! must track `backend/migrations`.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::{
    PositionStoreError, VerificationTokenRepositoryError, WaitlistRepositoryError,
};

/// Partial unique index on `email` for non-deleted rows.
pub(super) const LIVE_EMAIL_INDEX: &str = "waitlist_entries_live_email_idx";
/// Unique constraint on `referral_code`.
pub(super) const REFERRAL_CODE_KEY: &str = "waitlist_entries_referral_code_key";

/// Coarse classification shared by every adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum DbFailure {
    Connection,
    Unique(Option<String>),
    /// Deadlock or serialisation failure; worth retrying.
    Contention,
    Query,
}

pub(super) fn classify(error: &DieselError) -> DbFailure {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
            match kind {
                DatabaseErrorKind::ClosedConnection => DbFailure::Connection,
                DatabaseErrorKind::UniqueViolation => {
                    DbFailure::Unique(info.constraint_name().map(str::to_owned))
                }
                DatabaseErrorKind::SerializationFailure => DbFailure::Contention,
                _ => DbFailure::Query,
            }
        }
        other => {
            debug!(error = %other, "diesel operation failed");
            DbFailure::Query
        }
    }
}

pub(super) fn position_error(error: DieselError) -> PositionStoreError {
    match classify(&error) {
        DbFailure::Connection => PositionStoreError::connection("database connection error"),
        DbFailure::Unique(Some(name)) if name == LIVE_EMAIL_INDEX => {
            PositionStoreError::duplicate_email()
        }
        DbFailure::Unique(Some(name)) if name == REFERRAL_CODE_KEY => {
            PositionStoreError::duplicate_referral_code()
        }
        DbFailure::Unique(_) => PositionStoreError::query("unexpected unique violation"),
        DbFailure::Contention => PositionStoreError::query("transaction contention"),
        DbFailure::Query => PositionStoreError::query("database error"),
    }
}

pub(super) fn repository_error(error: DieselError) -> WaitlistRepositoryError {
    match classify(&error) {
        DbFailure::Connection => WaitlistRepositoryError::connection("database connection error"),
        DbFailure::Contention => WaitlistRepositoryError::query("transaction contention"),
        DbFailure::Unique(_) | DbFailure::Query => WaitlistRepositoryError::query("database error"),
    }
}

pub(super) fn token_error(error: DieselError) -> VerificationTokenRepositoryError {
    match classify(&error) {
        DbFailure::Connection => {
            VerificationTokenRepositoryError::connection("database connection error")
        }
        DbFailure::Contention => VerificationTokenRepositoryError::query("transaction contention"),
        DbFailure::Unique(_) | DbFailure::Query => {
            VerificationTokenRepositoryError::query("database error")
        }
    }
}
