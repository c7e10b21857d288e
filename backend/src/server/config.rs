//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::time::Duration;

use waitlist::config::{SettingsError, WaitlistSettings};
use waitlist::domain::{RateLimitPolicies, WaitlistConfig};
use waitlist::inbound::http::auth::AdminCredentials;
use waitlist::outbound::email::HttpEmailSenderConfig;
use waitlist::outbound::persistence::DbPool;

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) admin: AdminCredentials,
    pub(crate) queue: WaitlistConfig,
    pub(crate) policies: RateLimitPolicies,
    pub(crate) email: Option<HttpEmailSenderConfig>,
    pub(crate) maintenance_interval: Duration,
    pub(crate) db_pool: Option<DbPool>,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    /// Derive the server configuration from loaded settings.
    ///
    /// # Errors
    /// Returns [`SettingsError`] when an address or URL is malformed.
    pub fn from_settings(settings: &WaitlistSettings) -> Result<Self, SettingsError> {
        let admin = settings
            .admin_token()
            .map_or_else(AdminCredentials::disabled, AdminCredentials::from_token);
        let email = settings
            .email_api_url()?
            .map(|endpoint| HttpEmailSenderConfig {
                endpoint,
                api_key: settings.email_api_key.clone(),
                sender: settings.email_sender().to_owned(),
                timeout: settings.email_timeout(),
            });
        Ok(Self {
            bind_addr: settings.bind_addr()?,
            admin,
            queue: WaitlistConfig {
                verification_ttl_hours: settings.verification_ttl_hours(),
                verify_link_base: settings.verify_link_base()?,
                store_policy: settings.store_policy(),
            },
            policies: settings.rate_limit_policies(),
            email,
            maintenance_interval: settings.maintenance_interval(),
            db_pool: None,
            #[cfg(feature = "metrics")]
            prometheus: None,
        })
    }

    /// Attach a database connection pool for persistence adapters.
    ///
    /// Without a pool the queue runs on in-memory stores.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }
}
