//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the ledger, built on SQLx.
//!
//! # Architecture
//!
//! - [`repositories`] holds row types and plain SQL functions over a single
//!   connection, so callers decide the transaction boundary
//! - [`adapters`] implements the `domain_ledger` storage ports on a pool,
//!   opening one transaction per unit of work
//!
//! # Concurrency
//!
//! Posting and reversing lock the entry row and then every touched account
//! row with `SELECT ... FOR UPDATE`, in account id order, and apply balance
//! changes as `current_balance = current_balance + $delta` inside the same
//! transaction. Entry numbers come from a counter row that is incremented in
//! the inserting transaction, so an aborted insert never consumes a number.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledger")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresLedgerStore;
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
