//! Timeout and retry policy for calls into backing storage.
//!
//! Every store call is bounded by a timeout that surfaces as a connection
//! failure. Transient failures of a whole logical operation are retried once
//! after a fixed backoff by the caller that owns the transaction.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::WaitlistError;
use super::ports::{PositionStoreError, VerificationTokenRepositoryError, WaitlistRepositoryError};

/// Port errors that can describe an elapsed store deadline.
pub trait StoreTimeout {
    /// Error reported when a call did not finish within `after`.
    fn timed_out(after: Duration) -> Self;
}

macro_rules! impl_store_timeout {
    ($($error:ty),* $(,)?) => {
        $(
            impl StoreTimeout for $error {
                fn timed_out(after: Duration) -> Self {
                    Self::connection(format!("timed out after {}ms", after.as_millis()))
                }
            }
        )*
    };
}

impl_store_timeout!(
    PositionStoreError,
    WaitlistRepositoryError,
    VerificationTokenRepositoryError,
);

/// Deadline and retry settings for store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Upper bound for one store call.
    pub timeout: Duration,
    /// Pause before the single retry.
    pub retry_backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl StorePolicy {
    /// Run one store call under the configured deadline.
    pub async fn call<T, E, F>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: StoreTimeout,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(self.timeout)),
        }
    }

    /// Run `operation`, retrying once after the backoff when it fails with
    /// [`WaitlistError::StoreUnavailable`].
    pub async fn retry_once<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, WaitlistError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WaitlistError>>,
    {
        match attempt().await {
            Err(error) if error.is_transient() => {
                warn!(operation, %error, backoff_ms = self.retry_backoff.as_millis(), "retrying after store failure");
                tokio::time::sleep(self.retry_backoff).await;
                attempt().await
            }
            other => other,
        }
    }
}
