//! Service settings loaded via OrthoConfig.
//!
//! Every field is optional on the wire; accessors apply defaults and parse
//! addresses and URLs so the binary can fail fast on bad input.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::TimeDelta;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{
    MAX_TTL_HOURS, MIN_TTL_HOURS, RateLimitPolicies, RateLimitPolicy, StorePolicy,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_VERIFY_LINK_BASE: &str = "http://localhost:8080/verify";
const DEFAULT_EMAIL_SENDER: &str = "waitlist@localhost";
const DEFAULT_TTL_HOURS: u32 = 24;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STORE_RETRY_BACKOFF_MS: u64 = 100;
const DEFAULT_EMAIL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 300;

/// Problems turning raw settings into typed values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A socket address did not parse.
    #[error("{field} is not a socket address: {message}")]
    InvalidAddress {
        /// Setting name.
        field: &'static str,
        /// Parser message.
        message: String,
    },
    /// A URL did not parse.
    #[error("{field} is not a valid URL: {message}")]
    InvalidUrl {
        /// Setting name.
        field: &'static str,
        /// Parser message.
        message: String,
    },
}

/// Configuration for the waitlist service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WAITLIST")]
pub struct WaitlistSettings {
    /// Listen address.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; in-memory adapters are used when absent.
    pub database_url: Option<String>,
    /// Bearer token for admin routes; admin routes are disabled when absent.
    pub admin_token: Option<String>,
    /// Verification token lifetime in hours.
    pub verification_ttl_hours: Option<u32>,
    /// Base URL the verification token is appended to.
    pub verify_link_base: Option<String>,
    /// Email provider endpoint; emails are only logged when absent.
    pub email_api_url: Option<String>,
    /// Email provider API key.
    pub email_api_key: Option<String>,
    /// From address for outbound email.
    pub email_sender: Option<String>,
    /// Email provider request timeout in milliseconds.
    pub email_timeout_ms: Option<u64>,
    /// Join requests allowed per window.
    pub join_limit: Option<u32>,
    /// Join window length in seconds.
    pub join_window_secs: Option<u32>,
    /// Verify and resend requests allowed per window.
    pub verify_limit: Option<u32>,
    /// Verify window length in seconds.
    pub verify_window_secs: Option<u32>,
    /// Status lookups allowed per window.
    pub status_limit: Option<u32>,
    /// Status window length in seconds.
    pub status_window_secs: Option<u32>,
    /// Deadline for one store call in milliseconds.
    pub store_timeout_ms: Option<u64>,
    /// Pause before retrying a transient store failure in milliseconds.
    pub store_retry_backoff_ms: Option<u64>,
    /// Interval between token purges and limiter eviction in seconds.
    pub maintenance_interval_secs: Option<u64>,
}

impl WaitlistSettings {
    /// Parsed listen address.
    ///
    /// # Errors
    /// Returns [`SettingsError::InvalidAddress`] when the value is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|err: std::net::AddrParseError| SettingsError::InvalidAddress {
            field: "bind_addr",
            message: err.to_string(),
        })
    }

    /// Configured database URL, ignoring blank values.
    pub fn database_url(&self) -> Option<&str> {
        non_blank(self.database_url.as_deref())
    }

    /// Configured admin token, ignoring blank values.
    pub fn admin_token(&self) -> Option<&str> {
        non_blank(self.admin_token.as_deref())
    }

    /// Token lifetime clamped to the supported range.
    pub fn verification_ttl_hours(&self) -> u32 {
        self.verification_ttl_hours
            .unwrap_or(DEFAULT_TTL_HOURS)
            .clamp(MIN_TTL_HOURS, MAX_TTL_HOURS)
    }

    /// Parsed verification link base.
    ///
    /// # Errors
    /// Returns [`SettingsError::InvalidUrl`] when the value is malformed.
    pub fn verify_link_base(&self) -> Result<Url, SettingsError> {
        parse_url(
            "verify_link_base",
            self.verify_link_base.as_deref().unwrap_or(DEFAULT_VERIFY_LINK_BASE),
        )
    }

    /// Parsed email provider endpoint, if configured.
    ///
    /// # Errors
    /// Returns [`SettingsError::InvalidUrl`] when the value is malformed.
    pub fn email_api_url(&self) -> Result<Option<Url>, SettingsError> {
        non_blank(self.email_api_url.as_deref())
            .map(|raw| parse_url("email_api_url", raw))
            .transpose()
    }

    /// From address for outbound email.
    pub fn email_sender(&self) -> &str {
        non_blank(self.email_sender.as_deref()).unwrap_or(DEFAULT_EMAIL_SENDER)
    }

    /// Email provider request timeout.
    pub fn email_timeout(&self) -> Duration {
        Duration::from_millis(self.email_timeout_ms.unwrap_or(DEFAULT_EMAIL_TIMEOUT_MS))
    }

    /// Rate-limit policies with defaults filled in.
    pub fn rate_limit_policies(&self) -> RateLimitPolicies {
        let defaults = RateLimitPolicies::default();
        RateLimitPolicies {
            join: policy(defaults.join, self.join_limit, self.join_window_secs),
            verify: policy(defaults.verify, self.verify_limit, self.verify_window_secs),
            status: policy(defaults.status, self.status_limit, self.status_window_secs),
        }
    }

    /// Store deadline and retry settings.
    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            timeout: Duration::from_millis(
                self.store_timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS).max(1),
            ),
            retry_backoff: Duration::from_millis(
                self.store_retry_backoff_ms
                    .unwrap_or(DEFAULT_STORE_RETRY_BACKOFF_MS),
            ),
        }
    }

    /// Interval between maintenance sweeps.
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(
            self.maintenance_interval_secs
                .unwrap_or(DEFAULT_MAINTENANCE_INTERVAL_SECS)
                .max(1),
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, SettingsError> {
    Url::parse(raw).map_err(|err| SettingsError::InvalidUrl {
        field,
        message: err.to_string(),
    })
}

fn policy(fallback: RateLimitPolicy, max: Option<u32>, window_secs: Option<u32>) -> RateLimitPolicy {
    RateLimitPolicy {
        max: max.unwrap_or(fallback.max),
        window: window_secs.map_or(fallback.window, |secs| {
            TimeDelta::seconds(i64::from(secs.max(1)))
        }),
    }
}
