//! Server construction and middleware wiring.

mod config;
mod maintenance;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::ServerConfig;

#[cfg(feature = "metrics")]
use metrics::MetricsLayer;
use maintenance::spawn_maintenance;
use state_builders::build_http_state;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tracing::info;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use waitlist::Trace;
#[cfg(debug_assertions)]
use waitlist::doc::ApiDoc;
use waitlist::inbound::http::configure_api;
use waitlist::inbound::http::health::{HealthState, live, ready};
use waitlist::inbound::http::state::HttpState;

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(web::scope("/api/v1").configure(configure_api))
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Construct an Actix HTTP server using the provided health state and configuration.
///
/// Also starts the maintenance loop that purges expired tokens and stale
/// rate-limit windows.
///
/// # Errors
/// Propagates [`std::io::Error`] when adapter setup or binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let http_state = build_http_state(&config)?;
    let _maintenance = spawn_maintenance(
        http_state.queue.clone(),
        http_state.limiter.clone(),
        config.maintenance_interval,
    );
    let http_state = web::Data::new(http_state);
    let bind_addr = config.bind_addr();

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(config.prometheus);

    let server = HttpServer::new(move || {
        let app = build_app(server_health_state.clone(), http_state.clone());

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .bind(bind_addr)?
    .run();

    info!(%bind_addr, "waitlist server listening");
    health_state.mark_ready();
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::test;
    use waitlist::inbound::http::auth::AdminCredentials;
    use waitlist::test_support::InMemoryWaitlist;

    #[actix_web::test]
    async fn routes_api_and_probes_under_trace() {
        let waitlist = InMemoryWaitlist::new();
        let health = web::Data::new(HealthState::new());
        health.mark_ready();
        let state = web::Data::new(HttpState::new(
            waitlist.service.clone(),
            Arc::new(waitlist.limiter()),
            AdminCredentials::disabled(),
        ));
        let app = test::init_service(build_app(health, state)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;
        assert!(res.status().is_success());
        assert!(res.headers().contains_key("trace-id"));

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/waitlist")
                .set_json(serde_json::json!({ "email": "ada@example.com" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 201);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/admin/waitlist")
                .to_request(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 401);
    }
}
