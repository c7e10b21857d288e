//! Verification token values and their stored form.
//!
//! The raw token leaves the process only inside the verification link; storage
//! keeps the SHA-256 [`TokenDigest`] so a leaked table cannot be replayed.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

use super::EmailAddress;

const TOKEN_BYTES: usize = 32;

/// Rejected token input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("verification token is malformed")]
pub struct MalformedToken;

/// Raw, unguessable verification token.
///
/// Debug output is redacted and the buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Draw a fresh 256-bit token from a cryptographic RNG.
    pub fn generate<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0_u8; TOKEN_BYTES];
        rng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        bytes.zeroize();
        Self(token)
    }

    /// Parse a token presented by a client.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedToken`] unless the input is 64 hexadecimal digits.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, MalformedToken> {
        let trimmed = raw.as_ref().trim();
        if trimmed.len() != TOKEN_BYTES * 2 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MalformedToken);
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Reveal the token for embedding in a link.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Storage key for this token.
    #[must_use]
    pub fn digest(&self) -> TokenDigest {
        TokenDigest(Sha256::digest(self.0.as_bytes()).into())
    }
}

impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationToken(<redacted>)")
    }
}

impl Drop for VerificationToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// SHA-256 digest identifying a stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    /// Lower-case hex form used as the storage key.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Rebuild a digest from its stored hex form.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedToken`] when the input is not 32 hex-encoded bytes.
    pub fn from_hex(raw: &str) -> Result<Self, MalformedToken> {
        let mut bytes = [0_u8; 32];
        hex::decode_to_slice(raw, &mut bytes).map_err(|_| MalformedToken)?;
        Ok(Self(bytes))
    }
}

/// Persisted verification token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTokenRecord {
    /// Digest of the raw token.
    pub digest: TokenDigest,
    /// Entry the token confirms.
    pub email: EmailAddress,
    /// Instant after which the token is rejected.
    pub expires_at: DateTime<Utc>,
    /// Issue instant.
    pub created_at: DateTime<Utc>,
}

impl VerificationTokenRecord {
    /// Tokens remain valid up to and including `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Token handed back by the manager after a successful issue.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Raw token for the verification link.
    pub token: VerificationToken,
    /// Expiry recorded in storage.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    #[test]
    fn generated_tokens_are_distinct_hex() {
        let mut rng = StdRng::seed_from_u64(11);
        let first = VerificationToken::generate(&mut rng);
        let second = VerificationToken::generate(&mut rng);
        assert_ne!(first, second);
        assert_eq!(first.expose().len(), 64);
        assert!(VerificationToken::parse(first.expose()).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case(&"z".repeat(64))]
    fn rejects_malformed_tokens(#[case] raw: &str) {
        assert_eq!(VerificationToken::parse(raw), Err(MalformedToken));
    }

    #[test]
    fn digest_is_case_insensitive_and_round_trips() {
        let upper = VerificationToken::parse("AB".repeat(32)).expect("hex");
        let lower = VerificationToken::parse("ab".repeat(32)).expect("hex");
        assert_eq!(upper.digest(), lower.digest());
        let digest = lower.digest();
        assert_eq!(TokenDigest::from_hex(&digest.to_hex()), Ok(digest));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let token = VerificationToken::parse("cd".repeat(32)).expect("hex");
        assert!(!format!("{token:?}").contains("cdcd"));
    }

    #[test]
    fn expiry_is_exclusive_of_the_deadline() {
        let now = Utc::now();
        let record = VerificationTokenRecord {
            digest: VerificationToken::parse("01".repeat(32)).expect("hex").digest(),
            email: EmailAddress::parse("a@x.com").expect("email"),
            expires_at: now,
            created_at: now - TimeDelta::hours(24),
        };
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + TimeDelta::seconds(1)));
    }
}
