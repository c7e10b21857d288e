//! Administrative waitlist endpoints, guarded by the admin bearer token.
//!
//! ```text
//! GET    /api/v1/admin/waitlist?offset=0&limit=50&includeInactive=false
//! POST   /api/v1/admin/waitlist/{id}/invite
//! POST   /api/v1/admin/waitlist/{id}/block
//! DELETE /api/v1/admin/waitlist/{id}
//! ```

use actix_web::{HttpResponse, delete, get, post, web};
use serde_json::json;

use crate::domain::{EntryId, Error};

use super::ApiResult;
use super::auth::AdminAccess;
use super::state::HttpState;
use super::waitlist_dto::{EntryView, ListParams};

fn parse_entry_id(raw: &str) -> ApiResult<EntryId> {
    raw.parse().map_err(|_| {
        Error::invalid_request("entry id must be a UUID")
            .with_details(json!({ "field": "id", "value": raw }))
    })
}

/// Page through entries.
#[utoipa::path(
    get,
    path = "/api/v1/admin/waitlist",
    params(ListParams),
    responses(
        (status = 200, description = "Entries", body = [EntryView]),
        (status = 401, description = "Missing or invalid token", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    tags = ["admin"],
    operation_id = "listWaitlist",
    security(("AdminBearer" = []))
)]
#[get("/admin/waitlist")]
pub async fn list_entries(
    _admin: AdminAccess,
    state: web::Data<HttpState>,
    params: web::Query<ListParams>,
) -> ApiResult<web::Json<Vec<EntryView>>> {
    let entries = state.queue.list(params.into_inner().into()).await?;
    Ok(web::Json(entries.iter().map(EntryView::from).collect()))
}

/// Admit a verified entry.
#[utoipa::path(
    post,
    path = "/api/v1/admin/waitlist/{id}/invite",
    params(("id" = String, Path, description = "Entry identifier")),
    responses(
        (status = 200, description = "Entry invited", body = EntryView),
        (status = 401, description = "Missing or invalid token", body = Error),
        (status = 404, description = "Unknown entry", body = Error),
        (status = 409, description = "Entry is not verified", body = Error)
    ),
    tags = ["admin"],
    operation_id = "inviteEntry",
    security(("AdminBearer" = []))
)]
#[post("/admin/waitlist/{id}/invite")]
pub async fn invite_entry(
    _admin: AdminAccess,
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<EntryView>> {
    let id = parse_entry_id(&path)?;
    let entry = state.queue.invite(&id).await?;
    Ok(web::Json(EntryView::from(&entry)))
}

/// Block a queued entry.
#[utoipa::path(
    post,
    path = "/api/v1/admin/waitlist/{id}/block",
    params(("id" = String, Path, description = "Entry identifier")),
    responses(
        (status = 200, description = "Entry blocked", body = EntryView),
        (status = 401, description = "Missing or invalid token", body = Error),
        (status = 404, description = "Unknown entry", body = Error),
        (status = 409, description = "Entry already left the queue", body = Error)
    ),
    tags = ["admin"],
    operation_id = "blockEntry",
    security(("AdminBearer" = []))
)]
#[post("/admin/waitlist/{id}/block")]
pub async fn block_entry(
    _admin: AdminAccess,
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<EntryView>> {
    let id = parse_entry_id(&path)?;
    let entry = state.queue.block(&id).await?;
    Ok(web::Json(EntryView::from(&entry)))
}

/// Remove a queued entry.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/waitlist/{id}",
    params(("id" = String, Path, description = "Entry identifier")),
    responses(
        (status = 204, description = "Entry removed"),
        (status = 401, description = "Missing or invalid token", body = Error),
        (status = 404, description = "Unknown entry", body = Error),
        (status = 409, description = "Entry already left the queue", body = Error)
    ),
    tags = ["admin"],
    operation_id = "removeEntry",
    security(("AdminBearer" = []))
)]
#[delete("/admin/waitlist/{id}")]
pub async fn remove_entry(
    _admin: AdminAccess,
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_entry_id(&path)?;
    state.queue.remove(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
