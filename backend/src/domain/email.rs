//! Normalised email addresses.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254;

/// Validation errors for [`EmailAddress`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailValidationError {
    /// Input was empty after trimming.
    #[error("email must not be empty")]
    Empty,
    /// Input exceeded the RFC 5321 path limit.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    TooLong,
    /// Input is not shaped like `local@domain.tld`.
    #[error("email is not a valid address")]
    Malformed,
}

/// Email address compared case-insensitively.
///
/// The value is trimmed and lower-cased at construction so equality, hashing
/// and storage lookups all agree on one canonical spelling.
///
/// # Examples
/// ```
/// use waitlist::domain::EmailAddress;
///
/// let email = EmailAddress::parse("  Ada@Example.COM ").expect("valid");
/// assert_eq!(email.as_str(), "ada@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and normalise a raw address.
    ///
    /// # Errors
    ///
    /// Returns [`EmailValidationError`] when the input is empty, too long, or
    /// not of the form `local@domain.tld`.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, EmailValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EmailValidationError::Empty);
        }
        if trimmed.len() > MAX_EMAIL_LENGTH {
            return Err(EmailValidationError::TooLong);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(EmailValidationError::Malformed);
        }
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(EmailValidationError::Malformed);
        };
        let domain_ok = !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.');
        if local.is_empty() || !domain_ok {
            return Err(EmailValidationError::Malformed);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// Borrow the canonical address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = EmailValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a@x.com", "a@x.com")]
    #[case("  MiXeD@Example.Org\t", "mixed@example.org")]
    #[case("first.last+tag@sub.domain.io", "first.last+tag@sub.domain.io")]
    fn normalises_valid_input(#[case] raw: &str, #[case] expected: &str) {
        let email = EmailAddress::parse(raw).expect("valid email");
        assert_eq!(email.as_str(), expected);
    }

    #[rstest]
    #[case("", EmailValidationError::Empty)]
    #[case("   ", EmailValidationError::Empty)]
    #[case("no-at-sign.com", EmailValidationError::Malformed)]
    #[case("@x.com", EmailValidationError::Malformed)]
    #[case("a@localhost", EmailValidationError::Malformed)]
    #[case("a@b@x.com", EmailValidationError::Malformed)]
    #[case("a b@x.com", EmailValidationError::Malformed)]
    #[case("a@.x.com", EmailValidationError::Malformed)]
    fn rejects_invalid_input(#[case] raw: &str, #[case] expected: EmailValidationError) {
        assert_eq!(EmailAddress::parse(raw), Err(expected));
    }

    #[test]
    fn rejects_overlong_input() {
        let raw = format!("{}@x.com", "a".repeat(MAX_EMAIL_LENGTH));
        assert_eq!(EmailAddress::parse(raw), Err(EmailValidationError::TooLong));
    }

    #[test]
    fn equality_is_case_insensitive() {
        let lower = EmailAddress::parse("a@x.com").expect("valid");
        let upper = EmailAddress::parse("A@X.COM").expect("valid");
        assert_eq!(lower, upper);
    }

    #[test]
    fn deserialises_through_validation() {
        let parsed: Result<EmailAddress, _> = serde_json::from_str("\"nope\"");
        assert!(parsed.is_err());
        let ok: EmailAddress = serde_json::from_str("\"B@X.COM\"").expect("valid");
        assert_eq!(ok.as_str(), "b@x.com");
    }
}
