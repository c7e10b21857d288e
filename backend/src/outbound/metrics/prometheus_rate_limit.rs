//! Prometheus counters for rate-limit outcomes.

use async_trait::async_trait;
use prometheus::{IntCounterVec, Opts, Registry};

use crate::domain::OperationClass;
use crate::domain::ports::{AbuseEvent, RateLimitEvents, RateLimitEventsError};

/// Counts denials and abuse escalations per operation class.
///
/// - `waitlist_rate_limit_denied_total{class}`
/// - `waitlist_rate_limit_abuse_total{class}`
pub struct PrometheusRateLimitEvents {
    denied_total: IntCounterVec,
    abuse_total: IntCounterVec,
}

impl PrometheusRateLimitEvents {
    /// Create the counters and register them with `registry`.
    ///
    /// # Errors
    ///
    /// Fails when a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let denied_total = IntCounterVec::new(
            Opts::new(
                "waitlist_rate_limit_denied_total",
                "Requests rejected by the rate limiter",
            ),
            &["class"],
        )?;
        let abuse_total = IntCounterVec::new(
            Opts::new(
                "waitlist_rate_limit_abuse_total",
                "Clients that exceeded twice their allowance within one window",
            ),
            &["class"],
        )?;
        registry.register(Box::new(denied_total.clone()))?;
        registry.register(Box::new(abuse_total.clone()))?;
        Ok(Self {
            denied_total,
            abuse_total,
        })
    }
}

#[async_trait]
impl RateLimitEvents for PrometheusRateLimitEvents {
    async fn record_denied(&self, class: OperationClass) -> Result<(), RateLimitEventsError> {
        self.denied_total.with_label_values(&[class.as_str()]).inc();
        Ok(())
    }

    async fn record_abuse(&self, event: &AbuseEvent) -> Result<(), RateLimitEventsError> {
        self.abuse_total
            .with_label_values(&[event.key.class.as_str()])
            .inc();
        Ok(())
    }
}
