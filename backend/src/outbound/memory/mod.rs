//! In-process adapters used when no database is configured and in tests.
//!
//! They honour the same contracts as the Diesel adapters within a single
//! process; state is lost on restart.

mod rate_limit_store;
mod token_repository;
mod waitlist_store;

pub use rate_limit_store::InMemoryRateLimitStore;
pub use token_repository::InMemoryVerificationTokenRepository;
pub use waitlist_store::InMemoryWaitlistStore;
