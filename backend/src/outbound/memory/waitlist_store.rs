//! Arena-style waitlist table behind one mutex.
//!
//! Each operation runs under the lock, which plays the role of the row lock
//! the Diesel adapter takes on the queue version row.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    ListQuery, PositionStore, PositionStoreError, ShiftOutcome, WaitlistRepository,
    WaitlistRepositoryError,
};
use crate::domain::{
    EmailAddress, EntryId, EntryStatus, NewWaitlistEntry, Position, ReferralCode, WaitlistEntry,
};

const POISONED: &str = "waitlist store lock poisoned";

/// In-process implementation of [`PositionStore`] and [`WaitlistRepository`].
#[derive(Debug, Default)]
pub struct InMemoryWaitlistStore {
    rows: Mutex<Vec<WaitlistEntry>>,
}

impl InMemoryWaitlistStore {
    fn rows(&self) -> Result<MutexGuard<'_, Vec<WaitlistEntry>>, String> {
        self.rows.lock().map_err(|_| POISONED.to_owned())
    }

    fn positions(&self) -> Result<MutexGuard<'_, Vec<WaitlistEntry>>, PositionStoreError> {
        self.rows().map_err(PositionStoreError::query)
    }

    fn entries(&self) -> Result<MutexGuard<'_, Vec<WaitlistEntry>>, WaitlistRepositoryError> {
        self.rows().map_err(WaitlistRepositoryError::query)
    }
}

fn active_count(rows: &[WaitlistEntry]) -> u64 {
    rows.iter().filter(|row| row.status.is_active()).count() as u64
}

fn index_of(rows: &[WaitlistEntry], id: &EntryId) -> Option<usize> {
    rows.iter().position(|row| &row.id == id)
}

#[async_trait]
impl PositionStore for InMemoryWaitlistStore {
    async fn assign_next_position(
        &self,
        entry: &NewWaitlistEntry,
    ) -> Result<WaitlistEntry, PositionStoreError> {
        let mut rows = self.positions()?;
        if rows
            .iter()
            .any(|row| row.status != EntryStatus::Deleted && row.email == entry.email)
        {
            return Err(PositionStoreError::duplicate_email());
        }
        if rows
            .iter()
            .any(|row| row.referral_code == entry.referral_code)
        {
            return Err(PositionStoreError::duplicate_referral_code());
        }

        let position = Position::after_count(active_count(&rows))
            .map_err(|error| PositionStoreError::query(error.to_string()))?;
        let placed = entry.clone().into_entry(position);
        rows.push(placed.clone());
        Ok(placed)
    }

    async fn shift_range(
        &self,
        entry_id: &EntryId,
        expected: Position,
        now: DateTime<Utc>,
    ) -> Result<ShiftOutcome, PositionStoreError> {
        let mut rows = self.positions()?;
        let mover = index_of(&rows, entry_id).ok_or_else(PositionStoreError::not_found)?;
        let current = rows.get(mover).ok_or_else(PositionStoreError::not_found)?;
        if !current.status.is_active() || current.position != expected {
            return Err(PositionStoreError::position_conflict(expected));
        }
        if expected == Position::FIRST {
            return Ok(ShiftOutcome::AtHead);
        }

        let target = expected.predecessor();
        let displaced = rows
            .iter()
            .position(|row| row.status.is_active() && row.position == target)
            .ok_or_else(|| PositionStoreError::query(format!("no active entry at position {target}")))?;

        let displaced_id = {
            let row = rows
                .get_mut(displaced)
                .ok_or_else(PositionStoreError::not_found)?;
            row.position = expected;
            row.updated_at = now;
            row.id
        };
        let row = rows.get_mut(mover).ok_or_else(PositionStoreError::not_found)?;
        row.position = target;
        row.updated_at = now;
        Ok(ShiftOutcome::Moved {
            to: target,
            displaced: displaced_id,
        })
    }

    async fn remove_and_compact(
        &self,
        entry_id: &EntryId,
        expected: EntryStatus,
        next: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, PositionStoreError> {
        let mut rows = self.positions()?;
        let index = index_of(&rows, entry_id).ok_or_else(PositionStoreError::not_found)?;
        let row = rows.get_mut(index).ok_or_else(PositionStoreError::not_found)?;
        if row.status != expected {
            return Err(PositionStoreError::status_conflict(row.status));
        }
        let was_active = row.status.is_active();
        let vacated = row.position;
        row.status = next;
        row.updated_at = now;
        let updated = row.clone();

        if was_active && !next.is_active() {
            for other in rows
                .iter_mut()
                .filter(|other| other.status.is_active() && other.position > vacated)
            {
                other.position = Position::new(other.position.get() - 1)
                    .map_err(|error| PositionStoreError::query(error.to_string()))?;
                other.updated_at = now;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl WaitlistRepository for InMemoryWaitlistStore {
    async fn find_by_id(
        &self,
        id: &EntryId,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError> {
        Ok(self.entries()?.iter().find(|row| &row.id == id).cloned())
    }

    async fn find_live_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError> {
        Ok(self
            .entries()?
            .iter()
            .find(|row| row.status != EntryStatus::Deleted && &row.email == email)
            .cloned())
    }

    async fn find_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<WaitlistEntry>, WaitlistRepositoryError> {
        Ok(self
            .entries()?
            .iter()
            .find(|row| &row.referral_code == code)
            .cloned())
    }

    async fn count_active(&self) -> Result<u64, WaitlistRepositoryError> {
        Ok(active_count(&self.entries()?))
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<WaitlistEntry>, WaitlistRepositoryError> {
        let rows = self.entries()?;
        let mut active: Vec<_> = rows.iter().filter(|r| r.status.is_active()).cloned().collect();
        active.sort_by_key(|r| r.position);
        if query.include_inactive {
            let mut inactive: Vec<_> = rows.iter().filter(|r| !r.status.is_active()).cloned().collect();
            inactive.sort_by_key(|r| r.updated_at);
            active.extend(inactive);
        }
        Ok(active
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
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
        let mut rows = self.entries()?;
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or_else(WaitlistRepositoryError::not_found)?;
        if row.status != expected {
            return Err(WaitlistRepositoryError::status_conflict(row.status));
        }
        row.status = next;
        row.updated_at = now;
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rstest::{fixture, rstest};

    fn new_entry(rng: &mut SmallRng, email: &str) -> NewWaitlistEntry {
        NewWaitlistEntry {
            id: EntryId::random(),
            email: EmailAddress::parse(email).expect("email"),
            referral_code: ReferralCode::generate(rng),
            referred_by: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded(count: usize) -> (InMemoryWaitlistStore, Vec<WaitlistEntry>) {
        let store = InMemoryWaitlistStore::default();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut placed = Vec::new();
        for i in 0..count {
            let entry = new_entry(&mut rng, &format!("user{i}@x.com"));
            placed.push(store.assign_next_position(&entry).await.expect("assign"));
        }
        (store, placed)
    }

    async fn positions(store: &InMemoryWaitlistStore) -> Vec<(EntryId, u32)> {
        store
            .list(ListQuery::default())
            .await
            .expect("list")
            .into_iter()
            .map(|e| (e.id, e.position.get()))
            .collect()
    }

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[rstest]
    #[tokio::test]
    async fn positions_are_assigned_in_order() {
        let (_, placed) = seeded(3).await;
        let got: Vec<u32> = placed.iter().map(|e| e.position.get()).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn duplicate_live_email_is_rejected() {
        let (store, placed) = seeded(1).await;
        let mut rng = SmallRng::seed_from_u64(99);
        let again = new_entry(&mut rng, placed[0].email.as_str());
        assert_eq!(
            store.assign_next_position(&again).await,
            Err(PositionStoreError::DuplicateEmail)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn shift_swaps_with_predecessor(now: DateTime<Utc>) {
        let (store, placed) = seeded(5).await;
        let a = &placed[4];
        let b = &placed[3];

        let outcome = store
            .shift_range(&a.id, a.position, now)
            .await
            .expect("shift");

        assert_eq!(
            outcome,
            ShiftOutcome::Moved {
                to: Position::new(4).expect("position"),
                displaced: b.id,
            }
        );
        let order = positions(&store).await;
        assert_eq!(order[3], (a.id, 4));
        assert_eq!(order[4], (b.id, 5));
        assert_eq!(order[0], (placed[0].id, 1));
    }

    #[rstest]
    #[tokio::test]
    async fn shift_at_head_is_a_no_op(now: DateTime<Utc>) {
        let (store, placed) = seeded(2).await;
        let outcome = store
            .shift_range(&placed[0].id, Position::FIRST, now)
            .await
            .expect("shift");
        assert_eq!(outcome, ShiftOutcome::AtHead);
    }

    #[rstest]
    #[tokio::test]
    async fn stale_shift_is_a_conflict(now: DateTime<Utc>) {
        let (store, placed) = seeded(3).await;
        let stale = Position::new(2).expect("position");
        let result = store.shift_range(&placed[2].id, stale, now).await;
        assert_eq!(result, Err(PositionStoreError::position_conflict(stale)));
    }

    #[rstest]
    #[tokio::test]
    async fn removal_compacts_later_positions(now: DateTime<Utc>) {
        let (store, placed) = seeded(4).await;

        let removed = store
            .remove_and_compact(&placed[1].id, EntryStatus::Pending, EntryStatus::Deleted, now)
            .await
            .expect("remove");

        assert_eq!(removed.status, EntryStatus::Deleted);
        let order = positions(&store).await;
        assert_eq!(
            order,
            vec![(placed[0].id, 1), (placed[2].id, 2), (placed[3].id, 3)]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn removal_checks_expected_status(now: DateTime<Utc>) {
        let (store, placed) = seeded(1).await;
        let result = store
            .remove_and_compact(&placed[0].id, EntryStatus::Verified, EntryStatus::Invited, now)
            .await;
        assert_eq!(
            result,
            Err(PositionStoreError::status_conflict(EntryStatus::Pending))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn deleted_email_may_rejoin(now: DateTime<Utc>) {
        let (store, placed) = seeded(1).await;
        store
            .remove_and_compact(&placed[0].id, EntryStatus::Pending, EntryStatus::Deleted, now)
            .await
            .expect("remove");
        let mut rng = SmallRng::seed_from_u64(1234);
        let again = new_entry(&mut rng, placed[0].email.as_str());
        let rejoined = store.assign_next_position(&again).await.expect("rejoin");
        assert_eq!(rejoined.position, Position::FIRST);
    }

    #[rstest]
    #[tokio::test]
    async fn update_status_refuses_to_leave_queue(now: DateTime<Utc>) {
        let (store, placed) = seeded(1).await;
        let result = store
            .update_status(&placed[0].id, EntryStatus::Pending, EntryStatus::Blocked, now)
            .await;
        assert!(matches!(result, Err(WaitlistRepositoryError::Query { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn listing_can_include_inactive_entries(now: DateTime<Utc>) {
        let (store, placed) = seeded(3).await;
        store
            .remove_and_compact(&placed[0].id, EntryStatus::Pending, EntryStatus::Blocked, now)
            .await
            .expect("block");

        let active = store.list(ListQuery::default()).await.expect("list");
        let all = store
            .list(ListQuery {
                include_inactive: true,
                ..ListQuery::default()
            })
            .await
            .expect("list");

        assert_eq!(active.len(), 2);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].id, placed[0].id);
        assert_eq!(store.count_active().await, Ok(2));
    }
}
