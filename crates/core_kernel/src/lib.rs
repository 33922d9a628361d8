//! Core Kernel - Foundational types shared by the ledger crates
//!
//! This crate provides the building blocks used across the workspace:
//! - Strongly-typed identifiers for accounts, journal entries and users
//! - Currency metadata and decimal rounding helpers for monetary amounts
//! - The port error type and marker traits implemented by storage adapters

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Currency, MoneyError, REPORT_TOLERANCE};
pub use identifiers::{AccountId, JournalEntryId, JournalLineId, UserId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
