//! Test Utilities Crate
//!
//! Shared test infrastructure for the recharge financing workspace.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built plans, amounts, phones and dates
//! - `builders`: Builders for catalog data and a fully wired orchestrator
//! - `database`: PostgreSQL test container with the schema applied
//! - `assertions`: Assertion helpers for money, schedules and ledgers
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
