//! PostgreSQL-backed verification token storage.
//!
//! Only SHA-256 digests are stored. `take` is a single `DELETE ... RETURNING`
//! so a token can be consumed at most once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{VerificationTokenRepository, VerificationTokenRepositoryError};
use crate::domain::{EmailAddress, TokenDigest, VerificationTokenRecord};

use super::error_mapping::token_error;
use super::models::VerificationTokenRow;
use super::pool::DbPool;
use super::schema::verification_tokens;

/// Diesel implementation of [`VerificationTokenRepository`].
#[derive(Clone)]
pub struct DieselVerificationTokenRepository {
    pool: DbPool,
}

impl DieselVerificationTokenRepository {
    /// Wrap a connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn connection(
        &self,
    ) -> Result<
        diesel_async::pooled_connection::bb8::PooledConnection<'_, diesel_async::AsyncPgConnection>,
        VerificationTokenRepositoryError,
    > {
        self.pool
            .get()
            .await
            .map_err(|err| VerificationTokenRepositoryError::connection(err.into_message()))
    }
}

fn affected(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

#[async_trait]
impl VerificationTokenRepository for DieselVerificationTokenRepository {
    async fn replace_for_email(
        &self,
        record: &VerificationTokenRecord,
    ) -> Result<(), VerificationTokenRepositoryError> {
        let mut conn = self.connection().await?;
        let row = VerificationTokenRow::from(record);
        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                diesel::delete(
                    verification_tokens::table.filter(verification_tokens::email.eq(&row.email)),
                )
                .execute(conn)
                .await?;
                diesel::insert_into(verification_tokens::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(token_error)
    }

    async fn take(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<VerificationTokenRecord>, VerificationTokenRepositoryError> {
        let mut conn = self.connection().await?;
        let row: Option<VerificationTokenRow> =
            diesel::delete(verification_tokens::table.find(digest.to_hex()))
                .returning(VerificationTokenRow::as_returning())
                .get_result(&mut conn)
                .await
                .optional()
                .map_err(token_error)?;
        row.map(|row| {
            VerificationTokenRecord::try_from(row).map_err(VerificationTokenRepositoryError::query)
        })
        .transpose()
    }

    async fn restore(
        &self,
        record: &VerificationTokenRecord,
    ) -> Result<bool, VerificationTokenRepositoryError> {
        let mut conn = self.connection().await?;
        let row = VerificationTokenRow::from(record);
        conn.transaction::<_, DieselError, _>(|conn| {
            async move {
                let bound: i64 = verification_tokens::table
                    .filter(verification_tokens::email.eq(&row.email))
                    .count()
                    .get_result(conn)
                    .await?;
                if bound > 0 {
                    return Ok(false);
                }
                let inserted = diesel::insert_into(verification_tokens::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;
                Ok(inserted == 1)
            }
            .scope_boxed()
        })
        .await
        .map_err(token_error)
    }

    async fn revoke_for_email(
        &self,
        email: &EmailAddress,
    ) -> Result<u64, VerificationTokenRepositoryError> {
        let mut conn = self.connection().await?;
        let deleted = diesel::delete(
            verification_tokens::table.filter(verification_tokens::email.eq(email.as_str())),
        )
        .execute(&mut conn)
        .await
        .map_err(token_error)?;
        Ok(affected(deleted))
    }

    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, VerificationTokenRepositoryError> {
        let mut conn = self.connection().await?;
        let deleted = diesel::delete(
            verification_tokens::table.filter(verification_tokens::expires_at.lt(now)),
        )
        .execute(&mut conn)
        .await
        .map_err(token_error)?;
        debug!(deleted, cutoff = %now, "purged expired verification tokens");
        Ok(affected(deleted))
    }
}
