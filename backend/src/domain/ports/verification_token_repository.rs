//! Port for verification token persistence.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EmailAddress, TokenDigest, VerificationTokenRecord};

use super::define_port_error;

define_port_error! {
    /// Errors raised by verification token repository adapters.
    pub enum VerificationTokenRepositoryError {
        /// Repository connection could not be established or timed out.
        @transient Connection { message: String } => "token repository connection failed: {message}",
        /// Query or mutation failed during execution.
        @transient Query { message: String } => "token repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationTokenRepository: Send + Sync {
    /// Atomically drop every token bound to the record's email and store
    /// `record` in their place.
    async fn replace_for_email(
        &self,
        record: &VerificationTokenRecord,
    ) -> Result<(), VerificationTokenRepositoryError>;

    /// Delete and return the token with `digest`.
    ///
    /// Two concurrent callers never both receive the record.
    async fn take(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<VerificationTokenRecord>, VerificationTokenRepositoryError>;

    /// Store a previously taken `record` again unless another token is already
    /// bound to its email. Returns whether the record was stored.
    async fn restore(
        &self,
        record: &VerificationTokenRecord,
    ) -> Result<bool, VerificationTokenRepositoryError>;

    /// Delete every token bound to `email`, returning how many were removed.
    async fn revoke_for_email(
        &self,
        email: &EmailAddress,
    ) -> Result<u64, VerificationTokenRepositoryError>;

    /// Delete tokens whose expiry lies before `now`.
    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, VerificationTokenRepositoryError>;
}
