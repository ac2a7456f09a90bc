//! Domain Adapters
//!
//! Implementations of the domain store ports on PostgreSQL. Each adapter
//! implements its port trait, translates rows into domain types and maps
//! [`crate::DatabaseError`] onto `PortError`.
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresOrderStore;
//! use domain_delivery::{DeliveryService, OrderStore};
//!
//! let store: Arc<dyn OrderStore> = Arc::new(PostgresOrderStore::new(pool));
//! let service = DeliveryService::new(store);
//! ```

pub mod orders;
pub mod obligations;

pub use orders::PostgresOrderStore;
pub use obligations::PostgresObligationStore;

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{AdapterHealth, HealthCheckResult};

/// Runs `SELECT 1` and times it
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await;

    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("Database error: {}", e)),
            checked_at: Utc::now(),
        },
    }
}
