//! Sinks for rate-limit denials and abuse escalations.
//!
//! [`TracingRateLimitEvents`] writes abuse events to the `abuse_review` log
//! target. The Prometheus adapter is compiled only with the `metrics` feature.
//! [`FanOutRateLimitEvents`] forwards each event to several sinks.

#[cfg(feature = "metrics")]
mod prometheus_rate_limit;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::OperationClass;
use crate::domain::ports::{AbuseEvent, RateLimitEvents, RateLimitEventsError};

#[cfg(feature = "metrics")]
pub use prometheus_rate_limit::PrometheusRateLimitEvents;

/// Log target carrying abuse escalations for offline review.
pub const ABUSE_REVIEW_TARGET: &str = "abuse_review";

/// Sink that records abuse escalations as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRateLimitEvents;

#[async_trait]
impl RateLimitEvents for TracingRateLimitEvents {
    async fn record_denied(&self, _class: OperationClass) -> Result<(), RateLimitEventsError> {
        Ok(())
    }

    async fn record_abuse(&self, event: &AbuseEvent) -> Result<(), RateLimitEventsError> {
        info!(
            target: ABUSE_REVIEW_TARGET,
            client = event.key.client.as_str(),
            class = event.key.class.as_str(),
            count = event.count,
            limit = event.limit,
            window_start = %event.window_start,
            "rate-limit abuse"
        );
        Ok(())
    }
}

/// Forwards events to every sink; the first failure is reported after all
/// sinks have been tried.
pub struct FanOutRateLimitEvents {
    sinks: Vec<Arc<dyn RateLimitEvents>>,
}

impl FanOutRateLimitEvents {
    /// Combine `sinks`.
    pub fn new(sinks: Vec<Arc<dyn RateLimitEvents>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl RateLimitEvents for FanOutRateLimitEvents {
    async fn record_denied(&self, class: OperationClass) -> Result<(), RateLimitEventsError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(error) = sink.record_denied(class).await {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn record_abuse(&self, event: &AbuseEvent) -> Result<(), RateLimitEventsError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(error) = sink.record_abuse(event).await {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
