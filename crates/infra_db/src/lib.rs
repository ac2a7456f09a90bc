//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the delivery and payment domains, using SQLx.
//!
//! # Architecture
//!
//! - `repositories`: SQL and row types per table
//! - `adapters`: implementations of `OrderStore` and `ObligationStore`
//! - `blob`: filesystem `BlobStore` for proof-of-delivery photos
//!
//! Order and settlement writes are conditional single statements
//! (`UPDATE ... WHERE <precondition>`); an adapter reports a row that no
//! longer matches as `WriteOutcome::PreconditionFailed` rather than an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresOrderStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/cod_dispatch")).await?;
//! run_migrations(&pool).await?;
//! let orders = PostgresOrderStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;
pub mod blob;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use adapters::{PostgresObligationStore, PostgresOrderStore};
pub use blob::FsBlobStore;
