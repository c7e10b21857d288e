//! Waitlist entry-point: loads settings, prepares storage, and serves the API.

mod server;

use std::io;

use actix_web::web;
#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetricsBuilder;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use server::{ServerConfig, create_server};
use waitlist::config::WaitlistSettings;
use waitlist::inbound::http::health::HealthState;
use waitlist::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = WaitlistSettings::load()
        .map_err(|e| io::Error::other(format!("failed to load settings: {e}")))?;
    let config = ServerConfig::from_settings(&settings).map_err(io::Error::other)?;
    let config = match settings.database_url() {
        Some(url) => config.with_db_pool(prepare_database(url).await?),
        None => config,
    };
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(Some(make_metrics()?));

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)?;
    server.await
}

async fn prepare_database(url: &str) -> io::Result<DbPool> {
    let applied = run_pending_migrations(url)
        .await
        .map_err(io::Error::other)?;
    info!(applied, "database schema up to date");
    DbPool::new(PoolConfig::new(url))
        .await
        .map_err(|e| io::Error::other(e.into_message()))
}

#[cfg(feature = "metrics")]
fn make_metrics() -> io::Result<actix_web_prom::PrometheusMetrics> {
    PrometheusMetricsBuilder::new("waitlist")
        .endpoint("/metrics")
        .build()
        .map_err(|e| io::Error::other(format!("configure Prometheus metrics: {e}")))
}
