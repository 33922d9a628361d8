//! Row types and SQL for the ledger tables
//!
//! Functions here take a `&mut PgConnection` so the adapter can run several
//! of them inside one transaction. Queries are built at runtime and mapped
//! with `FromRow`; database enums mirror the domain enums one to one.

pub mod account;
pub mod journal;

pub use account::{AccountRow, DbAccountStatus, DbAccountType, DbNormalBalance};
pub use journal::{DbEntryStatus, DbEntryType, EntryRow, LineRow, PostedLineRow};
