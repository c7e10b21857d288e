//! PostgreSQL persistence adapters using Diesel.
//!
//! Adapters translate between row structs and domain types and map Diesel
//! failures to port errors; queue rules stay in the domain. Connections come
//! from a `bb8` pool through `diesel-async`.
//!
//! # Example
//!
//! ```no_run
//! use waitlist::outbound::persistence::{DbPool, DieselWaitlistStore, PoolConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/waitlist")).await?;
//! let _store = DieselWaitlistStore::new(pool);
//! # Ok(())
//! # }
//! ```

mod diesel_verification_token_repository;
mod diesel_waitlist_store;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_verification_token_repository::DieselVerificationTokenRepository;
pub use diesel_waitlist_store::DieselWaitlistStore;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
