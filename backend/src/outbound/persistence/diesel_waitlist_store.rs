//! PostgreSQL-backed waitlist store.
//!
//! Implements both [`PositionStore`] and [`WaitlistRepository`] over the
//! `waitlist_entries` table. Every position-mutating transaction starts by
//! bumping `waitlist_queue_state.version`; the row lock that update takes
//! serialises all position changes, across processes as well as tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{
    ListQuery, PositionStore, PositionStoreError, ShiftOutcome, WaitlistRepository,
    WaitlistRepositoryError,
};
use crate::domain::{
    EmailAddress, EntryId, EntryStatus, NewWaitlistEntry, Position, ReferralCode, WaitlistEntry,
};

use super::error_mapping::{position_error, repository_error};
use super::models::{NewWaitlistEntryRow, WaitlistEntryRow};
use super::pool::DbPool;
use super::schema::{waitlist_entries, waitlist_queue_state};

const QUEUE_STATE_ROW: i16 = 1;

/// Diesel implementation of the waitlist ports.
#[derive(Clone)]
pub struct DieselWaitlistStore {
    pool: DbPool,
}

impl DieselWaitlistStore {
    /// Wrap a connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside a position transaction: either the database or a domain
/// precondition that aborts the transaction.
enum TxError {
    Diesel(DieselError),
    Rejected(PositionStoreError),
}

impl From<DieselError> for TxError {
    fn from(error: DieselError) -> Self {
        Self::Diesel(error)
    }
}

impl From<TxError> for PositionStoreError {
    fn from(error: TxError) -> Self {
        match error {
            TxError::Diesel(error) => position_error(error),
            TxError::Rejected(error) => error,
        }
    }
}

fn active_statuses() -> [&'static str; 2] {
    EntryStatus::ACTIVE.map(EntryStatus::as_str)
}

fn to_column(position: Position) -> Result<i32, PositionStoreError> {
    i32::try_from(position.get())
        .map_err(|_| PositionStoreError::query(format!("position {position} exceeds column range")))
}

fn to_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

async fn bump_queue_version(conn: &mut AsyncPgConnection) -> Result<i64, DieselError> {
    diesel::update(waitlist_queue_state::table.find(QUEUE_STATE_ROW))
        .set(waitlist_queue_state::version.eq(waitlist_queue_state::version + 1))
        .returning(waitlist_queue_state::version)
        .get_result(conn)
        .await
}

async fn lock_entry(
    conn: &mut AsyncPgConnection,
    id: Uuid,
) -> Result<WaitlistEntryRow, TxError> {
    waitlist_entries::table
        .find(id)
        .select(WaitlistEntryRow::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()?
        .ok_or(TxError::Rejected(PositionStoreError::not_found()))
}

fn into_position_entry(row: WaitlistEntryRow) -> Result<WaitlistEntry, PositionStoreError> {
    WaitlistEntry::try_from(row).map_err(PositionStoreError::query)
}

fn into_repository_entry(row: WaitlistEntryRow) -> Result<WaitlistEntry, WaitlistRepositoryError> {
    WaitlistEntry::try_from(row).map_err(WaitlistRepositoryError::query)
}

#[async_trait]
impl PositionStore for DieselWaitlistStore {
    async fn assign_next_position(
        &self,
        entry: &NewWaitlistEntry,
    ) -> Result<WaitlistEntry, PositionStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| PositionStoreError::connection(err.into_message()))?;

        let row = conn
            .transaction::<_, TxError, _>(|conn| {
                async move {
                    bump_queue_version(conn).await?;
                    let active: i64 = waitlist_entries::table
                        .filter(waitlist_entries::status.eq_any(active_statuses()))
                        .count()
                        .get_result(conn)
                        .await?;
                    let position = Position::after_count(to_count(active))
                        .map_err(|err| PositionStoreError::query(err.to_string()))
                        .and_then(to_column)
                        .map_err(TxError::Rejected)?;
                    let inserted = diesel::insert_into(waitlist_entries::table)
                        .values(NewWaitlistEntryRow::pending(entry, position))
                        .returning(WaitlistEntryRow::as_returning())
                        .get_result(conn)
                        .await?;
                    Ok(inserted)
                }
                .scope_boxed()
            })
            .await?;
        into_position_entry(row)
    }

    async fn shift_range(
        &self,
        entry_id: &EntryId,
        expected: Position,
        now: DateTime<Utc>,
    ) -> Result<ShiftOutcome, PositionStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| PositionStoreError::connection(err.into_message()))?;
        let mover_id = *entry_id.as_uuid();
        let expected_column = to_column(expected)?;

        let outcome = conn
            .transaction::<_, TxError, _>(|conn| {
                async move {
                    bump_queue_version(conn).await?;
                    let mover = lock_entry(conn, mover_id).await?;
                    let queued = active_statuses().contains(&mover.status.as_str());
                    if !queued || mover.position != expected_column {
                        return Err(TxError::Rejected(PositionStoreError::position_conflict(
                            expected,
                        )));
                    }
                    if expected == Position::FIRST {
                        return Ok(ShiftOutcome::AtHead);
                    }

                    let target = expected.predecessor();
                    let target_column = to_column(target).map_err(TxError::Rejected)?;
                    let displaced: Option<Uuid> = diesel::update(
                        waitlist_entries::table
                            .filter(waitlist_entries::status.eq_any(active_statuses()))
                            .filter(waitlist_entries::position.eq(target_column))
                            .filter(waitlist_entries::id.ne(mover_id)),
                    )
                    .set((
                        waitlist_entries::position.eq(expected_column),
                        waitlist_entries::updated_at.eq(now),
                    ))
                    .returning(waitlist_entries::id)
                    .get_result(conn)
                    .await
                    .optional()?;
                    let displaced = displaced.ok_or_else(|| {
                        TxError::Rejected(PositionStoreError::query(format!(
                            "no active entry at position {target}"
                        )))
                    })?;

                    diesel::update(waitlist_entries::table.find(mover_id))
                        .set((
                            waitlist_entries::position.eq(target_column),
                            waitlist_entries::updated_at.eq(now),
                        ))
                        .execute(conn)
                        .await?;
                    Ok(ShiftOutcome::Moved {
                        to: target,
                        displaced: EntryId::from_uuid(displaced),
                    })
                }
                .scope_boxed()
            })
            .await?;
        Ok(outcome)
    }

    async fn remove_and_compact(
        &self,
        entry_id: &EntryId,
        expected: EntryStatus,
        next: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, PositionStoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| PositionStoreError::connection(err.into_message()))?;
        let id = *entry_id.as_uuid();

        let row = conn
            .transaction::<_, TxError, _>(|conn| {
                async move {
                    bump_queue_version(conn).await?;
                    let current = lock_entry(conn, id).await?;
                    let actual = current.status.parse::<EntryStatus>().map_err(|err| {
                        TxError::Rejected(PositionStoreError::query(err.to_string()))
                    })?;
                    if actual != expected {
                        return Err(TxError::Rejected(PositionStoreError::status_conflict(
                            actual,
                        )));
                    }

                    let updated = diesel::update(waitlist_entries::table.find(id))
                        .set((
                            waitlist_entries::status.eq(next.as_str()),
                            waitlist_entries::updated_at.eq(now),
                        ))
                        .returning(WaitlistEntryRow::as_returning())
                        .get_result(conn)
                        .await?;

                    if actual.is_active() && !next.is_active() {
                        diesel::update(
                            waitlist_entries::table
                                .filter(waitlist_entries::status.eq_any(active_statuses()))
                                .filter(waitlist_entries::position.gt(current.position)),
                        )
                        .set((
                            waitlist_entries::position.eq(waitlist_entries::position - 1),
                            waitlist_entries::updated_at.eq(now),
                        ))
                        .execute(conn)
                        .await?;
                    }
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await?;
        into_position_entry(row)
    }
}

#[async_trait]
impl WaitlistRepository for DieselWaitlistStore {
    async fn find_by_id(
        &self,
        id: &EntryId,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| WaitlistRepositoryError::connection(err.into_message()))?;
        waitlist_entries::table
            .find(id.as_uuid())
            .select(WaitlistEntryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(repository_error)?
            .map(into_repository_entry)
            .transpose()
    }

    async fn find_live_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| WaitlistRepositoryError::connection(err.into_message()))?;
        waitlist_entries::table
            .filter(waitlist_entries::email.eq(email.as_str()))
            .filter(waitlist_entries::status.ne(EntryStatus::Deleted.as_str()))
            .select(WaitlistEntryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(repository_error)?
            .map(into_repository_entry)
            .transpose()
    }

    async fn find_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| WaitlistRepositoryError::connection(err.into_message()))?;
        waitlist_entries::table
            .filter(waitlist_entries::referral_code.eq(code.as_str()))
            .select(WaitlistEntryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(repository_error)?
            .map(into_repository_entry)
            .transpose()
    }

    async fn count_active(&self) -> Result<u64, WaitlistRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| WaitlistRepositoryError::connection(err.into_message()))?;
        let active: i64 = waitlist_entries::table
            .filter(waitlist_entries::status.eq_any(active_statuses()))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(repository_error)?;
        Ok(to_count(active))
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<WaitlistEntry>, WaitlistRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| WaitlistRepositoryError::connection(err.into_message()))?;
        let offset = i64::from(query.offset);
        let limit = i64::from(query.limit);

        let mut rows: Vec<WaitlistEntryRow> = waitlist_entries::table
            .filter(waitlist_entries::status.eq_any(active_statuses()))
            .order(waitlist_entries::position.asc())
            .offset(offset)
            .limit(limit)
            .select(WaitlistEntryRow::as_select())
            .load(&mut conn)
            .await
            .map_err(repository_error)?;

        let remaining = limit - i64::try_from(rows.len()).unwrap_or(limit);
        if query.include_inactive && remaining > 0 {
            let active: i64 = waitlist_entries::table
                .filter(waitlist_entries::status.eq_any(active_statuses()))
                .count()
                .get_result(&mut conn)
                .await
                .map_err(repository_error)?;
            let inactive: Vec<WaitlistEntryRow> = waitlist_entries::table
                .filter(waitlist_entries::status.ne_all(active_statuses()))
                .order((waitlist_entries::updated_at.asc(), waitlist_entries::id.asc()))
                .offset((offset - active).max(0))
                .limit(remaining)
                .select(WaitlistEntryRow::as_select())
                .load(&mut conn)
                .await
                .map_err(repository_error)?;
            rows.extend(inactive);
        }

        rows.into_iter().map(into_repository_entry).collect()
    }

    async fn update_status(
        &self,
        id: &EntryId,
        expected: EntryStatus,
        next: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, WaitlistRepositoryError> {
        if expected.is_active() != next.is_active() {
            return Err(WaitlistRepositoryError::query(
                "status change would alter queue membership",
            ));
        }
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| WaitlistRepositoryError::connection(err.into_message()))?;

        let updated: Option<WaitlistEntryRow> = diesel::update(
            waitlist_entries::table
                .filter(waitlist_entries::id.eq(id.as_uuid()))
                .filter(waitlist_entries::status.eq(expected.as_str())),
        )
        .set((
            waitlist_entries::status.eq(next.as_str()),
            waitlist_entries::updated_at.eq(now),
        ))
        .returning(WaitlistEntryRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(repository_error)?;

        if let Some(row) = updated {
            return into_repository_entry(row);
        }
        let actual: Option<String> = waitlist_entries::table
            .find(id.as_uuid())
            .select(waitlist_entries::status)
            .first(&mut conn)
            .await
            .optional()
            .map_err(repository_error)?;
        match actual {
            None => Err(WaitlistRepositoryError::not_found()),
            Some(raw) => {
                let actual = raw
                    .parse::<EntryStatus>()
                    .map_err(|err| WaitlistRepositoryError::query(err.to_string()))?;
                Err(WaitlistRepositoryError::status_conflict(actual))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn active_statuses_match_the_domain() {
        assert_eq!(active_statuses(), ["pending", "verified"]);
    }

    #[rstest]
    #[case(-3, 0)]
    #[case(0, 0)]
    #[case(7, 7)]
    fn negative_counts_clamp_to_zero(#[case] raw: i64, #[case] expected: u64) {
        assert_eq!(to_count(raw), expected);
    }

    #[test]
    fn rejected_preconditions_pass_through() {
        let error = PositionStoreError::from(TxError::Rejected(PositionStoreError::not_found()));
        assert_eq!(error, PositionStoreError::not_found());
    }

    #[test]
    fn diesel_failures_are_mapped() {
        let error = PositionStoreError::from(TxError::Diesel(DieselError::RollbackTransaction));
        assert_eq!(error, PositionStoreError::query("database error"));
    }
}
