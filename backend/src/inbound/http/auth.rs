//! Admin bearer-token guard.
//!
//! The configured token is kept only as a SHA-256 digest; presented tokens are
//! hashed and compared digest to digest. With no token configured every admin
//! request is rejected.

use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::{Ready, ready};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::Error;

use super::state::HttpState;

const BEARER_PREFIX: &str = "Bearer ";

/// Digest of the admin token, if one is configured.
#[derive(Clone, Default)]
pub struct AdminCredentials {
    digest: Option<[u8; 32]>,
}

impl AdminCredentials {
    /// Accept requests bearing `token`. Blank tokens disable admin access.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            return Self::disabled();
        }
        Self {
            digest: Some(Sha256::digest(token.as_bytes()).into()),
        }
    }

    /// Reject every admin request.
    pub fn disabled() -> Self {
        Self { digest: None }
    }

    /// Whether a token is configured.
    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    fn accepts(&self, presented: &str) -> bool {
        let Some(expected) = self.digest else {
            return false;
        };
        let actual: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        expected
            .iter()
            .zip(actual.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Proof that the request carried the admin bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
}

impl FromRequest for AdminAccess {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<HttpState>>() else {
            return ready(Err(Error::internal("HTTP state is not configured").into()));
        };
        let outcome = match bearer_token(req) {
            Some(token) if state.admin.accepts(token) => Ok(Self),
            Some(_) => {
                debug!(path = %req.path(), "admin token rejected");
                Err(Error::unauthorized("invalid admin token").into())
            }
            None => Err(Error::unauthorized("admin token required").into()),
        };
        ready(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("s3cret", true)]
    #[case("s3cret ", false)]
    #[case("other", false)]
    #[case("", false)]
    fn configured_token_matches_exactly(#[case] presented: &str, #[case] expected: bool) {
        assert_eq!(AdminCredentials::from_token("s3cret").accepts(presented), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_token_disables_admin(#[case] token: &str) {
        let credentials = AdminCredentials::from_token(token);
        assert!(!credentials.is_enabled());
        assert!(!credentials.accepts(""));
    }

    #[test]
    fn debug_output_hides_the_digest() {
        let rendered = format!("{:?}", AdminCredentials::from_token("s3cret"));
        assert_eq!(rendered, "AdminCredentials { enabled: true }");
    }
}
