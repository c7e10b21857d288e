//! Port receiving rate-limit denials and abuse escalations.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{OperationClass, RateLimitKey};

use super::define_port_error;

define_port_error! {
    /// Errors raised while recording rate-limit events.
    pub enum RateLimitEventsError {
        /// The sink rejected the write.
        Export { message: String } => "rate-limit event export failed: {message}",
    }
}

/// A key that exceeded twice its allowance within one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbuseEvent {
    /// Offending client and operation class.
    pub key: RateLimitKey,
    /// Requests counted so far in the window.
    pub count: u32,
    /// Configured allowance for the window.
    pub limit: u32,
    /// Start of the offending window.
    pub window_start: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitEvents: Send + Sync {
    /// Record a denied request.
    async fn record_denied(&self, class: OperationClass) -> Result<(), RateLimitEventsError>;

    /// Record an abuse escalation for offline review.
    async fn record_abuse(&self, event: &AbuseEvent) -> Result<(), RateLimitEventsError>;
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpRateLimitEvents;

#[async_trait]
impl RateLimitEvents for NoOpRateLimitEvents {
    async fn record_denied(&self, _class: OperationClass) -> Result<(), RateLimitEventsError> {
        Ok(())
    }

    async fn record_abuse(&self, _event: &AbuseEvent) -> Result<(), RateLimitEventsError> {
        Ok(())
    }
}
