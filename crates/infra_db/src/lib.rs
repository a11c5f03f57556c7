//! Infrastructure Database Layer
//!
//! PostgreSQL implementations of the recharge domain's ports, using SQLx
//! with runtime-checked queries.
//!
//! # Layout
//!
//! - [`pool`]: connection pool configuration and embedded migrations
//! - [`rows`]: row types and their conversion to domain values
//! - [`adapters`]: one adapter per port
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig};
//! use infra_db::adapters::PostgresRechargeStore;
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/recharge")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresRechargeStore::new(pool.clone());
//! ```

pub mod pool;
pub mod error;
pub mod rows;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use adapters::{
    PostgresCatalogAdapter, PostgresIdentityAdapter, PostgresRechargeStore, PostgresSettingsAdapter,
};
