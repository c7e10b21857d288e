//! Verification tokens held in a mutex-guarded map.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{VerificationTokenRepository, VerificationTokenRepositoryError};
use crate::domain::{EmailAddress, TokenDigest, VerificationTokenRecord};

/// In-process token repository.
#[derive(Debug, Default)]
pub struct InMemoryVerificationTokenRepository {
    tokens: Mutex<HashMap<TokenDigest, VerificationTokenRecord>>,
}

impl InMemoryVerificationTokenRepository {
    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<TokenDigest, VerificationTokenRecord>>, VerificationTokenRepositoryError>
    {
        self.tokens
            .lock()
            .map_err(|_| VerificationTokenRepositoryError::query("token store lock poisoned"))
    }

    /// Number of stored tokens; zero when the lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map(|tokens| tokens.len()).unwrap_or_default()
    }

    /// Whether no token is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn count(removed: usize) -> u64 {
    u64::try_from(removed).unwrap_or(u64::MAX)
}

#[async_trait]
impl VerificationTokenRepository for InMemoryVerificationTokenRepository {
    async fn replace_for_email(
        &self,
        record: &VerificationTokenRecord,
    ) -> Result<(), VerificationTokenRepositoryError> {
        let mut tokens = self.lock()?;
        tokens.retain(|_, existing| existing.email != record.email);
        tokens.insert(record.digest, record.clone());
        Ok(())
    }

    async fn take(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<VerificationTokenRecord>, VerificationTokenRepositoryError> {
        Ok(self.lock()?.remove(digest))
    }

    async fn restore(
        &self,
        record: &VerificationTokenRecord,
    ) -> Result<bool, VerificationTokenRepositoryError> {
        let mut tokens = self.lock()?;
        if tokens.values().any(|existing| existing.email == record.email) {
            return Ok(false);
        }
        tokens.insert(record.digest, record.clone());
        Ok(true)
    }

    async fn revoke_for_email(
        &self,
        email: &EmailAddress,
    ) -> Result<u64, VerificationTokenRepositoryError> {
        let mut tokens = self.lock()?;
        let before = tokens.len();
        tokens.retain(|_, existing| &existing.email != email);
        Ok(count(before - tokens.len()))
    }

    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, VerificationTokenRepositoryError> {
        let mut tokens = self.lock()?;
        let before = tokens.len();
        tokens.retain(|_, existing| !existing.is_expired(now));
        Ok(count(before - tokens.len()))
    }
}
