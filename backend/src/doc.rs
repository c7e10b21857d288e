//! OpenAPI documentation.
//!
//! [`ApiDoc`] registers every waitlist, admin and health endpoint plus the
//! admin bearer security scheme. Swagger UI serves it in debug builds.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{EmailProviderEvent, Error, ErrorCode};
use crate::inbound::http::waitlist_dto::{
    EntryView, JoinRequest, JoinResponse, ResendRequest, ResendResponse, StatusResponse,
    VerifyRequest, VerifyResponse,
};

/// Adds the admin bearer token scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);
        components.add_security_scheme(
            "AdminBearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Waitlist API",
        description = "Signup queue with email verification, referrals and admin admission."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::waitlist::join,
        crate::inbound::http::waitlist::verify,
        crate::inbound::http::waitlist::resend,
        crate::inbound::http::waitlist::status,
        crate::inbound::http::waitlist::email_event,
        crate::inbound::http::admin::list_entries,
        crate::inbound::http::admin::invite_entry,
        crate::inbound::http::admin::block_entry,
        crate::inbound::http::admin::remove_entry,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        EmailProviderEvent,
        JoinRequest,
        JoinResponse,
        VerifyRequest,
        VerifyResponse,
        ResendRequest,
        ResendResponse,
        StatusResponse,
        EntryView
    )),
    tags(
        (name = "waitlist", description = "Public signup and status endpoints"),
        (name = "admin", description = "Queue administration"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
