//! Test Utilities Crate
//!
//! Shared test infrastructure for the COD dispatch test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for orders and settlements
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators
//! - `database`: PostgreSQL (testcontainers) for repository tests

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;
pub mod database;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
pub use database::TestDatabase;
