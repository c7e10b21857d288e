//! Client identity used as the rate-limit key.
//!
//! The first `X-Forwarded-For` hop wins, then the peer address. Anything that
//! does not parse as an IP address collapses into the shared anonymous key.

use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::{Ready, ready};

use crate::domain::ClientKey;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Extractor yielding the caller's [`ClientKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub ClientKey);

impl ClientIdentity {
    /// Resolve the identity of `req`.
    pub fn of(req: &HttpRequest) -> Self {
        let forwarded = req
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        let key = match forwarded {
            Some(hop) => ClientKey::resolve(Some(hop)),
            None => req
                .peer_addr()
                .map_or_else(ClientKey::anonymous, |addr| ClientKey::from_ip(addr.ip())),
        };
        Self(key)
    }

    /// Borrow the key.
    pub fn key(&self) -> &ClientKey {
        &self.0
    }
}

impl FromRequest for ClientIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::of(req)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use rstest::rstest;
    use std::net::SocketAddr;

    fn peer() -> SocketAddr {
        SocketAddr::from(([198, 51, 100, 7], 41000))
    }

    #[rstest]
    #[case(Some("203.0.113.9, 10.0.0.1"), "203.0.113.9")]
    #[case(Some(" 2001:db8::1 "), "2001:db8::1")]
    #[case(Some("not-an-ip"), "anonymous")]
    #[case(None, "198.51.100.7")]
    #[case(Some(""), "198.51.100.7")]
    fn resolves_forwarded_then_peer(#[case] header: Option<&str>, #[case] expected: &str) {
        let mut req = TestRequest::default().peer_addr(peer());
        if let Some(value) = header {
            req = req.insert_header((FORWARDED_FOR, value));
        }
        let identity = ClientIdentity::of(&req.to_http_request());
        assert_eq!(identity.key().as_str(), expected);
    }

    #[test]
    fn missing_peer_is_anonymous() {
        let identity = ClientIdentity::of(&TestRequest::default().to_http_request());
        assert_eq!(identity.key(), &ClientKey::anonymous());
    }
}
