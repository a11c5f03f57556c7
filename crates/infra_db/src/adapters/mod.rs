//! Domain Adapters
//!
//! PostgreSQL implementations of the `domain_recharge` ports. Each adapter
//! owns a clone of the pool and translates rows through [`crate::rows`].
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresRechargeStore;
//! use domain_recharge::RechargeStore;
//!
//! let store: Arc<dyn RechargeStore> = Arc::new(PostgresRechargeStore::new(pool));
//! ```

pub mod identity;
pub mod catalog;
pub mod recharge_store;

pub use identity::PostgresIdentityAdapter;
pub use catalog::{PostgresCatalogAdapter, PostgresSettingsAdapter};
pub use recharge_store::PostgresRechargeStore;

use core_kernel::HealthCheckResult;
use sqlx::PgPool;

/// Runs `SELECT 1` and reports the latency
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult::healthy(adapter_id, latency_ms),
        Err(e) => HealthCheckResult::unhealthy(adapter_id, latency_ms, format!("Database error: {}", e)),
    }
}
