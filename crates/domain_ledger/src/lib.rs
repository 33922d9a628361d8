//! Ledger Domain - Double-entry bookkeeping core
//!
//! This crate provides:
//! - Chart of accounts with materialised, normal-balance-signed balances
//! - Draft journal entries with sequential entry numbers
//! - Atomic posting of drafts and reversal of posted entries
//! - Account ledgers, trial balances and profit and loss statements
//!
//! Every operation that mutates state takes the acting [`core_kernel::UserId`]
//! explicitly.

pub mod account;
pub mod adapters;
pub mod entries;
pub mod error;
pub mod journal;
pub mod policy;
pub mod ports;
pub mod posting;
pub mod registry;
pub mod reports;
pub mod reversal;
pub mod service;
pub mod validation;

pub use account::{
    Account, AccountNode, AccountStatus, AccountType, ChartTemplate, NewAccount, NormalBalance,
    StandardChartOfAccounts, UpdateAccount,
};
pub use adapters::InMemoryLedgerStore;
pub use entries::JournalEntryStore;
pub use error::{ErrorKind, FieldError, LedgerError};
pub use journal::{
    EntryStatus, EntryType, JournalEntry, JournalLine, JournalQuery, NewJournalEntry,
    NewJournalLine, UpdateJournalEntry,
};
pub use policy::LedgerPolicy;
pub use ports::{AccountQuery, AccountRepository, JournalStore, LedgerStore, PostedLine, PostedLineQuery};
pub use posting::{AccountBalance, PostingEngine, PostingResult};
pub use registry::AccountRegistry;
pub use reports::{DateRange, LedgerReports};
pub use reversal::{ReversalEngine, ReversalResult};
pub use service::LedgerService;
