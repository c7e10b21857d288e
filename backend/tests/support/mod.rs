//! Embedded PostgreSQL helpers for the Diesel adapter suites.
//!
//! Each test gets a fresh database on the shared cluster with the embedded
//! migrations applied. Set `SKIP_TEST_CLUSTER=1` where the cluster cannot
//! start; otherwise a bootstrap failure fails the test.

use std::time::Duration;

use pg_embedded_setup_unpriv::ClusterHandle;
use tokio::runtime::Runtime;
use uuid::Uuid;
use waitlist::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};

const CLUSTER_RETRIES: usize = 5;
const CLUSTER_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Whether `SKIP_TEST_CLUSTER` is set to a truthy value.
pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Report a cluster bootstrap failure: skip when allowed, panic otherwise.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

fn shared_cluster() -> Result<&'static ClusterHandle, String> {
    let mut attempt = 1;
    loop {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(error) if attempt < CLUSTER_RETRIES => {
                eprintln!("pg-embed: attempt {attempt}/{CLUSTER_RETRIES} failed: {error:?}");
                std::thread::sleep(CLUSTER_RETRY_DELAY);
                attempt += 1;
            }
            Err(error) => return Err(format!("start shared cluster: {error:?}")),
        }
    }
}

/// Create a uniquely named database, migrate it, and open a pool sized for
/// concurrent adapter calls.
pub fn migrated_database(runtime: &Runtime) -> Result<DbPool, String> {
    let cluster = shared_cluster()?;
    let name = format!("waitlist_test_{}", Uuid::new_v4().simple());
    cluster
        .create_database(name.as_str())
        .map_err(|err| format!("create database: {err:?}"))?;
    let url = cluster.connection().database_url(&name);

    runtime.block_on(async {
        run_pending_migrations(&url)
            .await
            .map_err(|err| format!("migrate: {err}"))?;
        DbPool::new(PoolConfig::new(url.as_str()).with_max_size(8))
            .await
            .map_err(|err| err.into_message())
    })
}
