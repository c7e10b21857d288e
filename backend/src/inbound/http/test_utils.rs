//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};

use crate::domain::{RateLimitPolicies, RateLimitPolicy};
use crate::test_support::InMemoryWaitlist;

use super::auth::AdminCredentials;
use super::configure_api;
use super::state::HttpState;

/// Admin token accepted by [`test_app`] services.
pub const ADMIN_TOKEN: &str = "admin-secret";

/// `Authorization` header value carrying [`ADMIN_TOKEN`].
pub fn admin_header() -> (&'static str, String) {
    ("Authorization", format!("Bearer {ADMIN_TOKEN}"))
}

/// Handler state over `waitlist` with the given policies.
pub fn http_state(waitlist: &InMemoryWaitlist, policies: RateLimitPolicies) -> HttpState {
    HttpState::new(
        waitlist.service.clone(),
        Arc::new(waitlist.limiter_with(policies)),
        AdminCredentials::from_token(ADMIN_TOKEN),
    )
}

/// Policies generous enough that tests never trip them.
pub fn relaxed_policies() -> RateLimitPolicies {
    let open = RateLimitPolicy::per_seconds(1_000, 60);
    RateLimitPolicies {
        join: open,
        verify: open,
        status: open,
    }
}

/// Application exposing the API over `state`; pass to `test::init_service`.
pub fn test_app(
    state: HttpState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .service(web::scope("/api/v1").configure(configure_api))
}
