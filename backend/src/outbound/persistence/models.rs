//! Internal Diesel row structs.
//!
//! These never leave the persistence layer; conversions into domain types
//! validate every column and report corrupt rows as query errors.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{
    EmailAddress, EntryId, EntryStatus, NewWaitlistEntry, Position, ReferralCode, TokenDigest,
    VerificationTokenRecord, WaitlistEntry,
};

use super::schema::{verification_tokens, waitlist_entries};

/// Row read from `waitlist_entries`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = waitlist_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct WaitlistEntryRow {
    pub id: Uuid,
    pub email: String,
    pub position: i32,
    pub status: String,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WaitlistEntryRow> for WaitlistEntry {
    type Error = String;

    fn try_from(row: WaitlistEntryRow) -> Result<Self, Self::Error> {
        let position = u32::try_from(row.position)
            .map_err(|err| err.to_string())
            .and_then(|raw| Position::new(raw).map_err(|err| err.to_string()))
            .map_err(|err| format!("corrupt position for entry {}: {err}", row.id))?;
        let referred_by = row
            .referred_by
            .as_deref()
            .map(ReferralCode::parse)
            .transpose()
            .map_err(|err| format!("corrupt referrer for entry {}: {err}", row.id))?;
        Ok(Self {
            id: EntryId::from_uuid(row.id),
            email: EmailAddress::parse(&row.email)
                .map_err(|err| format!("corrupt email for entry {}: {err}", row.id))?,
            position,
            status: row
                .status
                .parse::<EntryStatus>()
                .map_err(|err| format!("corrupt status for entry {}: {err}", row.id))?,
            referral_code: ReferralCode::parse(&row.referral_code)
                .map_err(|err| format!("corrupt referral code for entry {}: {err}", row.id))?,
            referred_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insertable new entry.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = waitlist_entries)]
pub(crate) struct NewWaitlistEntryRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub position: i32,
    pub status: &'static str,
    pub referral_code: &'a str,
    pub referred_by: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> NewWaitlistEntryRow<'a> {
    /// Pending row for `entry` at `position`.
    pub fn pending(entry: &'a NewWaitlistEntry, position: i32) -> Self {
        Self {
            id: *entry.id.as_uuid(),
            email: entry.email.as_str(),
            position,
            status: EntryStatus::Pending.as_str(),
            referral_code: entry.referral_code.as_str(),
            referred_by: entry.referred_by.as_ref().map(ReferralCode::as_str),
            created_at: entry.created_at,
            updated_at: entry.created_at,
        }
    }
}

/// Row read from and written to `verification_tokens`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = verification_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct VerificationTokenRow {
    pub digest: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&VerificationTokenRecord> for VerificationTokenRow {
    fn from(record: &VerificationTokenRecord) -> Self {
        Self {
            digest: record.digest.to_hex(),
            email: record.email.as_str().to_owned(),
            expires_at: record.expires_at,
            created_at: record.created_at,
        }
    }
}

impl TryFrom<VerificationTokenRow> for VerificationTokenRecord {
    type Error = String;

    fn try_from(row: VerificationTokenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            digest: TokenDigest::from_hex(&row.digest)
                .map_err(|_| "corrupt token digest".to_owned())?,
            email: EmailAddress::parse(&row.email)
                .map_err(|err| format!("corrupt token email: {err}"))?,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row() -> WaitlistEntryRow {
        WaitlistEntryRow {
            id: Uuid::nil(),
            email: "ada@example.com".to_owned(),
            position: 3,
            status: "verified".to_owned(),
            referral_code: "K7QW2MZ9PX".to_owned(),
            referred_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn valid_row_converts() {
        let entry = WaitlistEntry::try_from(row()).expect("valid row");
        assert_eq!(entry.position.get(), 3);
        assert_eq!(entry.status, EntryStatus::Verified);
    }

    #[rstest]
    #[case::zero_position(WaitlistEntryRow { position: 0, ..row() })]
    #[case::negative_position(WaitlistEntryRow { position: -4, ..row() })]
    #[case::unknown_status(WaitlistEntryRow { status: "archived".to_owned(), ..row() })]
    #[case::bad_code(WaitlistEntryRow { referral_code: "short".to_owned(), ..row() })]
    #[case::bad_referrer(WaitlistEntryRow { referred_by: Some("!!".to_owned()), ..row() })]
    fn corrupt_rows_are_rejected(#[case] bad: WaitlistEntryRow) {
        assert!(WaitlistEntry::try_from(bad).is_err());
    }

    #[test]
    fn corrupt_digest_is_rejected() {
        let bad = VerificationTokenRow {
            digest: "zz".to_owned(),
            email: "ada@example.com".to_owned(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };
        assert!(VerificationTokenRecord::try_from(bad).is_err());
    }
}
