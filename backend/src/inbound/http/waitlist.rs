//! Public waitlist endpoints.
//!
//! ```text
//! POST /api/v1/waitlist {"email":"ada@example.com","referralCode":"K7QW2MZ9PX"}
//! POST /api/v1/waitlist/verify {"token":"<64 hex chars>"}
//! POST /api/v1/waitlist/resend {"email":"ada@example.com"}
//! GET  /api/v1/waitlist/status?email=ada@example.com
//! POST /api/v1/waitlist/events/email {"type":"bounced","email":"ada@example.com","hard":true}
//! ```

use actix_web::{HttpResponse, get, post, web};

use crate::domain::{EmailProviderEvent, Error, OperationClass, WaitlistError};

use super::ApiResult;
use super::auth::AdminAccess;
use super::client_identity::ClientIdentity;
use super::state::HttpState;
use super::throttle::throttle;
use super::waitlist_dto::{
    JoinRequest, JoinResponse, ResendRequest, ResendResponse, StatusParams, StatusResponse,
    VerifyRequest, VerifyResponse,
};

/// Join the waitlist.
#[utoipa::path(
    post,
    path = "/api/v1/waitlist",
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Entry created", body = JoinResponse),
        (status = 400, description = "Invalid email", body = Error),
        (status = 409, description = "Email already queued", body = Error),
        (status = 429, description = "Too many requests", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    tags = ["waitlist"],
    operation_id = "joinWaitlist",
    security([])
)]
#[post("/waitlist")]
pub async fn join(
    state: web::Data<HttpState>,
    client: ClientIdentity,
    payload: web::Json<JoinRequest>,
) -> ApiResult<HttpResponse> {
    throttle(&state, &client, OperationClass::Join).await?;
    let JoinRequest {
        email,
        referral_code,
    } = payload.into_inner();
    let entry = state.queue.join(&email, referral_code.as_deref()).await?;
    Ok(HttpResponse::Created().json(JoinResponse::from(&entry)))
}

/// Confirm an email address with the token from the verification link.
#[utoipa::path(
    post,
    path = "/api/v1/waitlist/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Entry verified", body = VerifyResponse),
        (status = 400, description = "Token invalid or expired", body = Error),
        (status = 429, description = "Too many requests", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    tags = ["waitlist"],
    operation_id = "verifyEmail",
    security([])
)]
#[post("/waitlist/verify")]
pub async fn verify(
    state: web::Data<HttpState>,
    client: ClientIdentity,
    payload: web::Json<VerifyRequest>,
) -> ApiResult<web::Json<VerifyResponse>> {
    throttle(&state, &client, OperationClass::Verify).await?;
    let outcome = state.queue.verify(&payload.token).await?;
    Ok(web::Json(VerifyResponse::from(&outcome)))
}

/// Send a fresh verification link to a pending entry.
///
/// The response is the same whether or not the address is queued.
#[utoipa::path(
    post,
    path = "/api/v1/waitlist/resend",
    request_body = ResendRequest,
    responses(
        (status = 202, description = "Request accepted", body = ResendResponse),
        (status = 400, description = "Invalid email", body = Error),
        (status = 429, description = "Too many requests", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    tags = ["waitlist"],
    operation_id = "resendVerification",
    security([])
)]
#[post("/waitlist/resend")]
pub async fn resend(
    state: web::Data<HttpState>,
    client: ClientIdentity,
    payload: web::Json<ResendRequest>,
) -> ApiResult<HttpResponse> {
    throttle(&state, &client, OperationClass::Verify).await?;
    state.queue.resend(&payload.email).await?;
    Ok(HttpResponse::Accepted().json(ResendResponse { accepted: true }))
}

/// Look up an entry's place in the queue.
///
/// Lookups for addresses that are not queued count twice against the
/// caller's status limit.
#[utoipa::path(
    get,
    path = "/api/v1/waitlist/status",
    params(StatusParams),
    responses(
        (status = 200, description = "Queue status", body = StatusResponse),
        (status = 400, description = "Invalid email", body = Error),
        (status = 404, description = "Email not on the waitlist", body = Error),
        (status = 429, description = "Too many requests", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    tags = ["waitlist"],
    operation_id = "waitlistStatus",
    security([])
)]
#[get("/waitlist/status")]
pub async fn status(
    state: web::Data<HttpState>,
    client: ClientIdentity,
    params: web::Query<StatusParams>,
) -> ApiResult<web::Json<StatusResponse>> {
    throttle(&state, &client, OperationClass::Status).await?;
    let view = match state.queue.status(&params.email).await {
        Err(WaitlistError::NotFound) => {
            // A miss costs the caller a second slot in the status window.
            state.limiter.allow(client.key(), OperationClass::Status).await;
            return Err(Error::from(WaitlistError::NotFound));
        }
        found => found?,
    };
    Ok(web::Json(StatusResponse::from(view)))
}

/// Apply a delivery event reported by the email provider.
#[utoipa::path(
    post,
    path = "/api/v1/waitlist/events/email",
    request_body = EmailProviderEvent,
    responses(
        (status = 204, description = "Event applied"),
        (status = 400, description = "Unknown or malformed event", body = Error),
        (status = 401, description = "Missing or invalid token", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    tags = ["waitlist"],
    operation_id = "emailProviderEvent",
    security(("AdminBearer" = []))
)]
#[post("/waitlist/events/email")]
pub async fn email_event(
    _admin: AdminAccess,
    state: web::Data<HttpState>,
    payload: web::Json<EmailProviderEvent>,
) -> ApiResult<HttpResponse> {
    state.queue.apply_email_event(&payload).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
#[path = "waitlist_tests.rs"]
mod tests;
