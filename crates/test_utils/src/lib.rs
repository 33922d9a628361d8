//! Test Utilities Crate
//!
//! Shared test infrastructure for the ledger crates.
//!
//! # Modules
//!
//! - `fixtures`: Seeded books and predictable dates and amounts
//! - `builders`: Builders for account and journal entry requests
//! - `database`: PostgreSQL test containers with the ledger schema applied
//! - `assertions`: Assertion helpers for amounts, entries and reports
//! - `generators`: Proptest strategies for amounts and balanced entries

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
