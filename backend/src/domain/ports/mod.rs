//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod email_sender;
mod position_store;
mod rate_limit_events;
mod rate_limit_store;
mod verification_token_repository;
mod waitlist_repository;

#[cfg(test)]
pub use email_sender::MockEmailSender;
pub use email_sender::{EmailSendError, EmailSender, EmailTemplate};
#[cfg(test)]
pub use position_store::MockPositionStore;
pub use position_store::{PositionStore, PositionStoreError, ShiftOutcome};
#[cfg(test)]
pub use rate_limit_events::MockRateLimitEvents;
pub use rate_limit_events::{
    AbuseEvent, NoOpRateLimitEvents, RateLimitEvents, RateLimitEventsError,
};
#[cfg(test)]
pub use rate_limit_store::MockRateLimitStore;
pub use rate_limit_store::{RateLimitStore, RateLimitStoreError};
#[cfg(test)]
pub use verification_token_repository::MockVerificationTokenRepository;
pub use verification_token_repository::{
    VerificationTokenRepository, VerificationTokenRepositoryError,
};
#[cfg(test)]
pub use waitlist_repository::MockWaitlistRepository;
pub use waitlist_repository::{ListQuery, WaitlistRepository, WaitlistRepositoryError};

#[cfg(test)]
mod tests;
