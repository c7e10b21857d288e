//! Rate-limit enforcement for public endpoints.

use crate::domain::{Error, OperationClass, WaitlistError};

use super::ApiResult;
use super::client_identity::ClientIdentity;
use super::state::HttpState;

/// Count the request against `class` and reject it once the window is spent.
pub async fn throttle(
    state: &HttpState,
    client: &ClientIdentity,
    class: OperationClass,
) -> ApiResult<()> {
    let decision = state.limiter.allow(client.key(), class).await;
    if decision.allowed {
        Ok(())
    } else {
        Err(Error::from(WaitlistError::RateLimited {
            reset_at: decision.reset_at,
        }))
    }
}
