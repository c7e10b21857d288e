//! Waitlist entries, queue positions, statuses, and referral codes.
//!
//! ## Invariants
//! - Among entries whose status [`EntryStatus::is_active`], positions form
//!   the contiguous range `1..=N` once every operation has completed.
//! - A [`ReferralCode`] is minted once and never reassigned; entries are
//!   soft-deleted so their codes stay reserved.
//! - Terminal statuses ([`EntryStatus::Invited`], [`EntryStatus::Blocked`],
//!   [`EntryStatus::Deleted`]) have no outgoing transitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::EmailAddress;

/// Opaque, immutable identifier of a waitlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generate a random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an identifier loaded from storage.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Errors raised when building a [`Position`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// Positions are one-based.
    #[error("queue positions start at 1")]
    Zero,
    /// The queue grew beyond the representable range.
    #[error("queue position {0} is out of range")]
    OutOfRange(u64),
}

/// One-based slot in the active queue.
///
/// # Examples
/// ```
/// use waitlist::domain::Position;
///
/// let third = Position::new(3).expect("non-zero");
/// assert_eq!(third.predecessor().get(), 2);
/// assert_eq!(Position::FIRST.predecessor(), Position::FIRST);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Position(u32);

impl Position {
    /// Head of the queue.
    pub const FIRST: Self = Self(1);

    /// Build a position from a one-based index.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Zero`] for `0`.
    pub fn new(value: u32) -> Result<Self, PositionError> {
        if value == 0 {
            return Err(PositionError::Zero);
        }
        Ok(Self(value))
    }

    /// Slot following `active_count` occupied slots.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::OutOfRange`] when the result exceeds `u32`.
    pub fn after_count(active_count: u64) -> Result<Self, PositionError> {
        let next = active_count.saturating_add(1);
        u32::try_from(next)
            .map(Self)
            .map_err(|_| PositionError::OutOfRange(next))
    }

    /// Slot one closer to the head, floored at [`Position::FIRST`].
    #[must_use]
    pub fn predecessor(self) -> Self {
        Self(self.0.saturating_sub(1).max(1))
    }

    /// Slot one further from the head.
    #[must_use]
    pub fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Raw one-based value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u32> for Position {
    type Error = PositionError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Position> for u32 {
    fn from(value: Position) -> Self {
        value.0
    }
}

/// Lifecycle state of a waitlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Signed up, email not yet confirmed.
    Pending,
    /// Email confirmed; still queued.
    Verified,
    /// Admitted by an administrator.
    Invited,
    /// Removed for abuse.
    Blocked,
    /// Removed on request or during cleanup.
    Deleted,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move entry from {from} to {to}")]
pub struct InvalidTransition {
    /// Status the entry held.
    pub from: EntryStatus,
    /// Status that was requested.
    pub to: EntryStatus,
}

/// Unknown status string read from storage or input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entry status: {0}")]
pub struct ParseEntryStatusError(String);

impl EntryStatus {
    /// Statuses that hold a queue position.
    pub const ACTIVE: [Self; 2] = [Self::Pending, Self::Verified];

    /// Whether the entry occupies a slot in the active ordering.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Verified)
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Validate a move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for moves the state machine forbids.
    ///
    /// # Examples
    /// ```
    /// use waitlist::domain::EntryStatus;
    ///
    /// assert!(EntryStatus::Pending.transition_to(EntryStatus::Verified).is_ok());
    /// assert!(EntryStatus::Pending.transition_to(EntryStatus::Invited).is_err());
    /// assert!(EntryStatus::Invited.transition_to(EntryStatus::Deleted).is_err());
    /// ```
    pub fn transition_to(self, next: Self) -> Result<Self, InvalidTransition> {
        let allowed = match (self, next) {
            (Self::Pending, Self::Verified) | (Self::Verified, Self::Invited) => true,
            (Self::Pending | Self::Verified, Self::Blocked | Self::Deleted) => true,
            _ => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Invited => "invited",
            Self::Blocked => "blocked",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = ParseEntryStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "invited" => Ok(Self::Invited),
            "blocked" => Ok(Self::Blocked),
            "deleted" => Ok(Self::Deleted),
            other => Err(ParseEntryStatusError(other.to_owned())),
        }
    }
}

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTVWXYZ23456789";
const REFERRAL_CODE_LENGTH: usize = 10;

/// Validation errors for [`ReferralCode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferralCodeError {
    /// Wrong number of characters.
    #[error("referral code must be {REFERRAL_CODE_LENGTH} characters")]
    Length,
    /// Character outside the referral alphabet.
    #[error("referral code contains an invalid character")]
    Alphabet,
}

/// Shareable code attributing new signups to an existing entry.
///
/// Codes use an uppercase alphabet without look-alike glyphs (`I`, `L`, `O`,
/// `U`, `0`, `1`); parsing is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Mint a new random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..REFERRAL_CODE_LENGTH)
            .map(|_| {
                let index = rng.gen_range(0..REFERRAL_ALPHABET.len());
                char::from(REFERRAL_ALPHABET.get(index).copied().unwrap_or(b'A'))
            })
            .collect();
        Self(code)
    }

    /// Parse a code supplied by a client.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralCodeError`] when the length or alphabet is wrong.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ReferralCodeError> {
        let normalised = raw.as_ref().trim().to_ascii_uppercase();
        if normalised.len() != REFERRAL_CODE_LENGTH {
            return Err(ReferralCodeError::Length);
        }
        if !normalised.bytes().all(|b| REFERRAL_ALPHABET.contains(&b)) {
            return Err(ReferralCodeError::Alphabet);
        }
        Ok(Self(normalised))
    }

    /// Borrow the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ReferralCode {
    type Error = ReferralCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ReferralCode> for String {
    fn from(value: ReferralCode) -> Self {
        value.0
    }
}

/// A signup on the waitlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    /// Immutable identifier.
    pub id: EntryId,
    /// Unique (among non-deleted entries) normalised email.
    pub email: EmailAddress,
    /// Queue slot; meaningful only while the status is active.
    pub position: Position,
    /// Lifecycle state.
    pub status: EntryStatus,
    /// Code this entry shares to refer others.
    pub referral_code: ReferralCode,
    /// Code of the entry that referred this one.
    pub referred_by: Option<ReferralCode>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last status or position change.
    pub updated_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Position while queued; `None` once the entry left the queue.
    #[must_use]
    pub fn active_position(&self) -> Option<Position> {
        self.status.is_active().then_some(self.position)
    }
}

/// Entry data supplied when claiming the next queue slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWaitlistEntry {
    /// Pre-generated identifier.
    pub id: EntryId,
    /// Normalised email.
    pub email: EmailAddress,
    /// Freshly minted referral code.
    pub referral_code: ReferralCode,
    /// Resolved referrer code, if any.
    pub referred_by: Option<ReferralCode>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl NewWaitlistEntry {
    /// Materialise a pending entry at `position`.
    #[must_use]
    pub fn into_entry(self, position: Position) -> WaitlistEntry {
        WaitlistEntry {
            id: self.id,
            email: self.email,
            position,
            status: EntryStatus::Pending,
            referral_code: self.referral_code,
            referred_by: self.referred_by,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rstest::rstest;

    #[rstest]
    #[case(5, 4)]
    #[case(2, 1)]
    #[case(1, 1)]
    fn predecessor_floors_at_first(#[case] from: u32, #[case] expected: u32) {
        let position = Position::new(from).expect("non-zero");
        assert_eq!(position.predecessor().get(), expected);
    }

    #[test]
    fn zero_is_not_a_position() {
        assert_eq!(Position::new(0), Err(PositionError::Zero));
        assert!(serde_json::from_str::<Position>("0").is_err());
    }

    #[test]
    fn after_count_is_one_based() {
        assert_eq!(Position::after_count(0), Ok(Position::FIRST));
        assert_eq!(Position::after_count(41).map(Position::get), Ok(42));
        assert!(Position::after_count(u64::from(u32::MAX)).is_err());
    }

    #[rstest]
    #[case(EntryStatus::Pending, EntryStatus::Verified, true)]
    #[case(EntryStatus::Pending, EntryStatus::Blocked, true)]
    #[case(EntryStatus::Pending, EntryStatus::Deleted, true)]
    #[case(EntryStatus::Pending, EntryStatus::Invited, false)]
    #[case(EntryStatus::Verified, EntryStatus::Invited, true)]
    #[case(EntryStatus::Verified, EntryStatus::Deleted, true)]
    #[case(EntryStatus::Verified, EntryStatus::Pending, false)]
    #[case(EntryStatus::Invited, EntryStatus::Deleted, false)]
    #[case(EntryStatus::Blocked, EntryStatus::Verified, false)]
    #[case(EntryStatus::Deleted, EntryStatus::Pending, false)]
    fn state_machine(
        #[case] from: EntryStatus,
        #[case] to: EntryStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.transition_to(to).is_ok(), allowed);
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Verified,
            EntryStatus::Invited,
            EntryStatus::Blocked,
            EntryStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<EntryStatus>(), Ok(status));
        }
        assert!("paused".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn generated_codes_parse_back() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..32 {
            let code = ReferralCode::generate(&mut rng);
            assert_eq!(ReferralCode::parse(code.as_str()), Ok(code.clone()));
        }
    }

    #[rstest]
    #[case("short", ReferralCodeError::Length)]
    #[case("ABCDEFGHI0", ReferralCodeError::Alphabet)]
    #[case("abcdefghjk!", ReferralCodeError::Length)]
    fn rejects_bad_codes(#[case] raw: &str, #[case] expected: ReferralCodeError) {
        assert_eq!(ReferralCode::parse(raw), Err(expected));
    }

    #[test]
    fn code_parsing_is_case_insensitive() {
        let code = ReferralCode::parse(" abcdefghjk ").expect("valid");
        assert_eq!(code.as_str(), "ABCDEFGHJK");
    }
}
