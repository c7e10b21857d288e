//! Request and response bodies for the waitlist endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::ListQuery;
use crate::domain::{EntryStatus, QueueStatus, VerifyOutcome, WaitlistEntry};

/// Body for `POST /api/v1/waitlist`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Address to enrol.
    #[schema(example = "ada@example.com")]
    pub email: String,
    /// Code shared by an existing entry.
    #[serde(default)]
    #[schema(example = "K7QW2MZ9PX")]
    pub referral_code: Option<String>,
}

/// Result of a successful join.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// Queue slot, starting at 1.
    pub position: u32,
    /// Code to share with others.
    pub referral_code: String,
    /// Always `PENDING` for a new entry.
    #[schema(value_type = String, example = "PENDING")]
    pub status: EntryStatus,
}

impl From<&WaitlistEntry> for JoinResponse {
    fn from(entry: &WaitlistEntry) -> Self {
        Self {
            position: entry.position.get(),
            referral_code: entry.referral_code.as_str().to_owned(),
            status: entry.status,
        }
    }
}

/// Body for `POST /api/v1/waitlist/verify`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyRequest {
    /// Token from the verification link.
    pub token: String,
}

/// Result of a verification attempt.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Verified address.
    pub email: String,
    /// Entry status after verification.
    #[schema(value_type = String, example = "VERIFIED")]
    pub status: EntryStatus,
    /// The entry had been verified before this request.
    pub already_verified: bool,
}

impl From<&VerifyOutcome> for VerifyResponse {
    fn from(outcome: &VerifyOutcome) -> Self {
        let entry = outcome.entry();
        Self {
            email: entry.email.as_str().to_owned(),
            status: entry.status,
            already_verified: matches!(outcome, VerifyOutcome::AlreadyVerified(_)),
        }
    }
}

/// Body for `POST /api/v1/waitlist/resend`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ResendRequest {
    /// Address that should receive a fresh link.
    pub email: String,
}

/// Uniform acknowledgement for resend requests.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ResendResponse {
    /// Always `true`.
    pub accepted: bool,
}

/// Query for `GET /api/v1/waitlist/status`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusParams {
    /// Address to look up.
    pub email: String,
}

/// Public queue view.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Current slot; absent once the entry left the queue.
    pub position: Option<u32>,
    /// Lifecycle state.
    #[schema(value_type = String, example = "VERIFIED")]
    pub status: EntryStatus,
    /// Number of queued entries.
    pub total_count: u64,
}

impl From<QueueStatus> for StatusResponse {
    fn from(view: QueueStatus) -> Self {
        Self {
            position: view.position.map(|p| p.get()),
            status: view.status,
            total_count: view.total_count,
        }
    }
}

/// Query for `GET /api/v1/admin/waitlist`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ListParams {
    /// Entries to skip.
    #[serde(default)]
    pub offset: Option<u32>,
    /// Page size, clamped to 1..=200.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Include invited, blocked and deleted entries.
    #[serde(default)]
    pub include_inactive: Option<bool>,
}

impl From<ListParams> for ListQuery {
    fn from(params: ListParams) -> Self {
        let defaults = ListQuery::default();
        Self {
            offset: params.offset.unwrap_or(defaults.offset),
            limit: params.limit.unwrap_or(defaults.limit),
            include_inactive: params.include_inactive.unwrap_or(defaults.include_inactive),
        }
    }
}

/// Admin view of one entry.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    /// Entry identifier.
    #[schema(value_type = String, format = Uuid)]
    pub id: String,
    /// Normalised address.
    pub email: String,
    /// Queue slot while queued.
    pub position: Option<u32>,
    /// Lifecycle state.
    #[schema(value_type = String, example = "PENDING")]
    pub status: EntryStatus,
    /// Code this entry shares.
    pub referral_code: String,
    /// Code of the referrer, if any.
    pub referred_by: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<&WaitlistEntry> for EntryView {
    fn from(entry: &WaitlistEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            email: entry.email.as_str().to_owned(),
            position: entry.active_position().map(|p| p.get()),
            status: entry.status,
            referral_code: entry.referral_code.as_str().to_owned(),
            referred_by: entry.referred_by.as_ref().map(|code| code.as_str().to_owned()),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}
