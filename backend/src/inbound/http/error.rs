//! HTTP adapter mapping for domain errors.
//!
//! Keeps the domain error type HTTP-agnostic while turning failures into
//! consistent JSON bodies. Internal errors are redacted; rate-limit errors
//! carry a `Retry-After` header derived from the `resetAt` detail.

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::http::header::RETRY_AFTER;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::error;

use crate::domain::{Error, ErrorCode, TRACE_ID_HEADER, WaitlistError};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact_if_internal(error: &Error) -> Error {
    if matches!(error.code(), ErrorCode::InternalError) {
        let mut redacted = Error::internal("Internal server error");
        if let Some(id) = error.trace_id() {
            redacted = redacted.with_trace_id(id.to_owned());
        }
        redacted
    } else {
        error.clone()
    }
}

/// Whole seconds until `resetAt`, at least one.
fn retry_after_secs(error: &Error, now: DateTime<Utc>) -> Option<i64> {
    let reset_at = error
        .details()?
        .get("resetAt")?
        .as_str()?
        .parse::<DateTime<Utc>>()
        .ok()?;
    let millis = reset_at.signed_duration_since(now).num_milliseconds();
    Some(((millis + 999) / 1000).max(1))
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id.to_owned()));
        }
        if self.code() == ErrorCode::RateLimited
            && let Some(secs) = retry_after_secs(self, Utc::now())
        {
            builder.insert_header((RETRY_AFTER, secs.to_string()));
        }

        builder.json(redact_if_internal(self))
    }
}

impl ResponseError for WaitlistError {
    fn status_code(&self) -> StatusCode {
        status_for(Error::from(self.clone()).code())
    }

    fn error_response(&self) -> HttpResponse {
        Error::from(self.clone()).error_response()
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("Internal server error")
    }
}

/// Turn malformed JSON bodies into `invalid_request` payloads.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = match &err {
        JsonPayloadError::ContentType => "expected an application/json body".to_owned(),
        JsonPayloadError::Deserialize(inner) => inner.to_string(),
        other => other.to_string(),
    };
    Error::invalid_request("request body is invalid")
        .with_details(json!({ "message": message }))
        .into()
}

/// Turn malformed query strings into `invalid_request` payloads.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    Error::invalid_request("query string is invalid")
        .with_details(json!({ "message": err.to_string() }))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use chrono::TimeDelta;
    use rstest::rstest;

    async fn body_of(response: HttpResponse) -> serde_json::Value {
        let bytes = to_bytes(response.into_body()).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[rstest]
    #[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
    #[case(Error::unauthorized("no auth"), StatusCode::UNAUTHORIZED)]
    #[case(Error::forbidden("denied"), StatusCode::FORBIDDEN)]
    #[case(Error::not_found("missing"), StatusCode::NOT_FOUND)]
    #[case(Error::conflict("dup"), StatusCode::CONFLICT)]
    #[case(Error::rate_limited("slow"), StatusCode::TOO_MANY_REQUESTS)]
    #[case(Error::service_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_code_matches_error_code(#[case] error: Error, #[case] expected: StatusCode) {
        assert_eq!(ResponseError::status_code(&error), expected);
    }

    #[actix_web::test]
    async fn internal_errors_are_redacted_but_keep_trace_id() {
        let error = Error::internal("db password leaked")
            .with_trace_id("00000000-0000-0000-0000-000000000000")
            .with_details(json!({ "secret": "x" }));
        let response = error.error_response();
        assert_eq!(
            response
                .headers()
                .get(TRACE_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("00000000-0000-0000-0000-000000000000")
        );
        let body = body_of(response).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("details").is_none());
        assert_eq!(body["traceId"], "00000000-0000-0000-0000-000000000000");
    }

    #[actix_web::test]
    async fn rate_limited_sets_retry_after() {
        let reset_at = Utc::now() + TimeDelta::seconds(42);
        let response = Error::from(WaitlistError::RateLimited { reset_at }).error_response();
        let retry_after: i64 = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .expect("retry-after header");
        assert!((40..=43).contains(&retry_after));
        let body = body_of(response).await;
        assert_eq!(body["code"], "rate_limited");
        assert!(body["details"]["resetAt"].is_string());
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        let past = Error::rate_limited("slow").with_details(json!({ "resetAt": "2020-01-01T00:00:00Z" }));
        assert_eq!(retry_after_secs(&past, Utc::now()), Some(1));
        assert_eq!(retry_after_secs(&Error::rate_limited("slow"), Utc::now()), None);
    }

    #[test]
    fn waitlist_errors_respond_directly() {
        assert_eq!(
            ResponseError::status_code(&WaitlistError::DuplicateEmail),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ResponseError::status_code(&WaitlistError::store_unavailable("x")),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
