//! HTTP inbound adapter exposing the waitlist REST endpoints.

pub mod admin;
pub mod auth;
pub mod client_identity;
pub mod error;
pub mod health;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod throttle;
pub mod waitlist;
pub mod waitlist_dto;

use actix_web::web;

pub use error::ApiResult;

/// Register the `/api/v1` routes and body/query error handlers.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use waitlist::inbound::http::configure_api;
///
/// let _app = App::new().service(web::scope("/api/v1").configure(configure_api));
/// ```
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
        .service(waitlist::join)
        .service(waitlist::verify)
        .service(waitlist::resend)
        .service(waitlist::status)
        .service(waitlist::email_event)
        .service(admin::list_entries)
        .service(admin::invite_entry)
        .service(admin::block_entry)
        .service(admin::remove_entry);
}
