//! Domain Adapters
//!
//! Implementations of the `domain_ledger` storage ports on PostgreSQL.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_ledger::LedgerService;
//!
//! let store = Arc::new(PostgresLedgerStore::new(pool));
//! let ledger = LedgerService::new(store, LedgerPolicy::default());
//! ```

pub mod ledger;

pub use ledger::PostgresLedgerStore;
