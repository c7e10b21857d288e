//! Waitlist domain: value types, services, and ports.
//!
//! Purpose: own the queue semantics independently of transport and storage.
//! Services receive their collaborators as `Arc<dyn Port>` so adapters can be
//! swapped for in-memory doubles.
//!
//! Public surface:
//! - `WaitlistQueueService`: signup, verification, admission, and removal.
//! - `FixedWindowRateLimiter`: per-client throttling.
//! - `VerificationTokenManager` and `ReferralCreditEngine`: collaborators the
//!   queue service builds for itself.
//! - `Error`/`ErrorCode`: API error payload; `WaitlistError`: domain failures.

pub mod email;
pub mod entry;
pub mod error;
pub mod events;
pub mod ports;
pub mod queue;
pub mod rate_limit;
pub mod referral;
pub mod store_policy;
pub mod token;
pub mod trace_id;
pub mod verification;
pub mod waitlist_error;

pub use self::email::{EmailAddress, EmailValidationError};
pub use self::entry::{
    EntryId, EntryStatus, InvalidTransition, NewWaitlistEntry, ParseEntryStatusError, Position,
    PositionError, ReferralCode, ReferralCodeError, WaitlistEntry,
};
pub use self::error::{Error, ErrorCode, TRACE_ID_HEADER};
pub use self::events::EmailProviderEvent;
pub use self::queue::{
    MAX_LIST_LIMIT, QueueStatus, VerifyOutcome, WaitlistConfig, WaitlistPorts,
    WaitlistQueueService,
};
pub use self::rate_limit::{
    ClientKey, FixedWindowRateLimiter, OperationClass, RateLimitDecision, RateLimitKey,
    RateLimitPolicies, RateLimitPolicy, WindowSnapshot,
};
pub use self::referral::{CreditOutcome, MAX_CREDIT_ATTEMPTS, ReferralCreditEngine};
pub use self::store_policy::{StorePolicy, StoreTimeout};
pub use self::token::{IssuedToken, MalformedToken, TokenDigest, VerificationToken, VerificationTokenRecord};
pub use self::trace_id::TraceId;
pub use self::verification::{MAX_TTL_HOURS, MIN_TTL_HOURS, VerificationTokenManager};
pub use self::waitlist_error::WaitlistError;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use waitlist::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
