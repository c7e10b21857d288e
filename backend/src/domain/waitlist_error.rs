//! Failure taxonomy for waitlist operations and its mapping to API errors.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;

use super::ports::{
    PositionStoreError, VerificationTokenRepositoryError, WaitlistRepositoryError,
};
use super::{EntryStatus, Error, InvalidTransition};

/// Errors returned by the queue service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitlistError {
    /// A non-deleted entry already uses the email.
    #[error("this email is already on the waitlist")]
    DuplicateEmail,
    /// The requested status change is not allowed.
    #[error("cannot move entry from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: EntryStatus,
        /// Requested status.
        to: EntryStatus,
    },
    /// The token is unknown, malformed, or already used.
    #[error("verification token is invalid")]
    TokenInvalid,
    /// The token existed but its lifetime ran out.
    #[error("verification token has expired")]
    TokenExpired,
    /// The caller exhausted its allowance.
    #[error("too many requests")]
    RateLimited {
        /// When the current window closes.
        reset_at: DateTime<Utc>,
    },
    /// Backing storage failed or timed out after the retry.
    #[error("waitlist storage is unavailable: {message}")]
    StoreUnavailable {
        /// Adapter diagnostic; never shown to callers.
        message: String,
    },
    /// No entry matched.
    #[error("waitlist entry not found")]
    NotFound,
    /// The email could not be parsed.
    #[error("invalid email: {message}")]
    InvalidEmail {
        /// Validation failure.
        message: String,
    },
}

impl WaitlistError {
    /// Build [`WaitlistError::StoreUnavailable`].
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Whether a single retry may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl From<InvalidTransition> for WaitlistError {
    fn from(value: InvalidTransition) -> Self {
        Self::InvalidTransition {
            from: value.from,
            to: value.to,
        }
    }
}

impl From<PositionStoreError> for WaitlistError {
    fn from(value: PositionStoreError) -> Self {
        match value {
            PositionStoreError::DuplicateEmail => Self::DuplicateEmail,
            PositionStoreError::NotFound => Self::NotFound,
            other => Self::store_unavailable(other.to_string()),
        }
    }
}

impl From<WaitlistRepositoryError> for WaitlistError {
    fn from(value: WaitlistRepositoryError) -> Self {
        match value {
            WaitlistRepositoryError::NotFound => Self::NotFound,
            other => Self::store_unavailable(other.to_string()),
        }
    }
}

impl From<VerificationTokenRepositoryError> for WaitlistError {
    fn from(value: VerificationTokenRepositoryError) -> Self {
        Self::store_unavailable(value.to_string())
    }
}

impl From<WaitlistError> for Error {
    fn from(value: WaitlistError) -> Self {
        match value {
            WaitlistError::DuplicateEmail => Error::conflict(value.to_string()),
            WaitlistError::InvalidTransition { from, to } => Error::conflict(value.to_string())
                .with_details(json!({ "from": from.as_str(), "to": to.as_str() })),
            WaitlistError::TokenInvalid => Error::invalid_request(value.to_string())
                .with_details(json!({ "reason": "token_invalid" })),
            WaitlistError::TokenExpired => Error::invalid_request(value.to_string())
                .with_details(json!({ "reason": "token_expired" })),
            WaitlistError::RateLimited { reset_at } => Error::rate_limited(value.to_string())
                .with_details(json!({
                    "resetAt": reset_at.to_rfc3339_opts(SecondsFormat::Secs, true)
                })),
            WaitlistError::StoreUnavailable { .. } => {
                Error::service_unavailable("waitlist is temporarily unavailable")
            }
            WaitlistError::NotFound => Error::not_found(value.to_string()),
            WaitlistError::InvalidEmail { message } => Error::invalid_request("invalid email")
                .with_details(json!({ "field": "email", "message": message })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(WaitlistError::DuplicateEmail, ErrorCode::Conflict)]
    #[case(
        WaitlistError::InvalidTransition { from: EntryStatus::Pending, to: EntryStatus::Invited },
        ErrorCode::Conflict
    )]
    #[case(WaitlistError::TokenInvalid, ErrorCode::InvalidRequest)]
    #[case(WaitlistError::TokenExpired, ErrorCode::InvalidRequest)]
    #[case(WaitlistError::store_unavailable("db down"), ErrorCode::ServiceUnavailable)]
    #[case(WaitlistError::NotFound, ErrorCode::NotFound)]
    fn maps_to_api_codes(#[case] error: WaitlistError, #[case] expected: ErrorCode) {
        assert_eq!(Error::from(error).code(), expected);
    }

    #[test]
    fn rate_limited_carries_reset_hint() {
        let reset_at = Utc
            .with_ymd_and_hms(2026, 5, 1, 9, 30, 0)
            .single()
            .expect("valid time");
        let api = Error::from(WaitlistError::RateLimited { reset_at });
        assert_eq!(api.code(), ErrorCode::RateLimited);
        assert_eq!(
            api.details().and_then(|d| d.get("resetAt")),
            Some(&json!("2026-05-01T09:30:00Z"))
        );
    }

    #[test]
    fn store_diagnostics_are_not_exposed() {
        let api = Error::from(WaitlistError::store_unavailable("password=hunter2"));
        assert!(!api.message().contains("hunter2"));
    }

    #[test]
    fn duplicate_email_does_not_reveal_state() {
        let api = Error::from(WaitlistError::DuplicateEmail);
        assert!(api.details().is_none());
    }

    #[test]
    fn port_errors_translate() {
        assert_eq!(
            WaitlistError::from(PositionStoreError::duplicate_email()),
            WaitlistError::DuplicateEmail
        );
        assert!(WaitlistError::from(WaitlistRepositoryError::connection("x")).is_transient());
        assert!(!WaitlistError::TokenExpired.is_transient());
    }
}
