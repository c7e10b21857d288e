//! Outbound adapters implementing domain ports.
//!
//! - **persistence**: PostgreSQL-backed stores using Diesel
//! - **memory**: in-process stores for development and tests
//! - **email**: HTTP and logging email senders
//! - **metrics**: rate-limit event sinks (Prometheus behind `metrics`)
//!
//! Adapters translate between domain types and infrastructure
//! representations. Queue rules live in the domain.

pub mod email;
pub mod memory;
pub mod metrics;
pub mod persistence;
