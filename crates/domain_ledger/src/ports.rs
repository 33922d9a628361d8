//! Ledger Domain Ports
//!
//! Storage interfaces the ledger services depend on. Two adapters exist:
//!
//! - **In-memory**: [`crate::adapters::InMemoryLedgerStore`], used by tests and
//!   the `memory` backend
//! - **PostgreSQL**: `infra_db::PostgresLedgerStore`
//!
//! Services hold an `Arc<dyn LedgerStore>`:
//!
//! ```rust,ignore
//! let store: Arc<dyn LedgerStore> = match config.backend {
//!     StoreBackend::Memory => Arc::new(InMemoryLedgerStore::new()),
//!     StoreBackend::Postgres => Arc::new(PostgresLedgerStore::new(pool)),
//! };
//! let ledger = LedgerService::new(store, policy);
//! ```
//!
//! # Units of work
//!
//! Posting and reversing touch several accounts and one or two entries.
//! [`LedgerStore::commit_posting`] and [`LedgerStore::commit_reversal`] apply
//! all of it or none of it, and re-check the guards the caller relied on
//! inside the unit. A guard that no longer holds is reported as
//! [`PortError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{AccountId, DomainPort, HealthCheckable, JournalEntryId, PortError, UserId};

use crate::account::{Account, AccountStatus, AccountType};
use crate::journal::{EntryType, JournalEntry, JournalLine, JournalQuery, NewEntryRecord};

/// Query parameters for listing accounts
#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
    pub account_type: Option<AccountType>,
    pub status: Option<AccountStatus>,
    /// `Some(false)` excludes header accounts
    pub is_header: Option<bool>,
    pub parent_id: Option<AccountId>,
}

impl AccountQuery {
    pub fn by_type(account_type: AccountType) -> Self {
        Self { account_type: Some(account_type), ..Default::default() }
    }

    pub fn children_of(parent_id: AccountId) -> Self {
        Self { parent_id: Some(parent_id), ..Default::default() }
    }

    /// Every account lines can sit on, active or not
    pub fn non_header() -> Self {
        Self { is_header: Some(false), ..Default::default() }
    }

    pub fn matches(&self, account: &Account) -> bool {
        self.account_type.map_or(true, |t| account.account_type == t)
            && self.status.map_or(true, |s| account.status == s)
            && self.is_header.map_or(true, |h| account.is_header == h)
            && self.parent_id.map_or(true, |p| account.parent_id == Some(p))
    }
}

/// A posted line joined with its entry header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedLine {
    pub entry_id: JournalEntryId,
    pub entry_number: String,
    pub sequence: i64,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub entry_description: String,
    pub reference_no: Option<String>,
    pub line_no: u32,
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
}

impl PostedLine {
    pub fn from_entry(entry: &JournalEntry, line: &JournalLine) -> Self {
        Self {
            entry_id: entry.id,
            entry_number: entry.entry_number.clone(),
            sequence: entry.sequence,
            entry_date: entry.entry_date,
            entry_type: entry.entry_type,
            entry_description: entry.description.clone(),
            reference_no: entry.reference_no.clone(),
            line_no: line.line_no,
            account_id: line.account_id,
            debit: line.debit,
            credit: line.credit,
            description: line.description.clone(),
        }
    }

    /// Ordering key: entry date, then entry number, then line position
    pub fn sort_key(&self) -> (NaiveDate, i64, u32) {
        (self.entry_date, self.sequence, self.line_no)
    }
}

/// Filters for posted lines
///
/// `from` and `to` are inclusive, `before` is exclusive.
#[derive(Debug, Clone, Default)]
pub struct PostedLineQuery {
    /// `None` means every account
    pub account_ids: Option<Vec<AccountId>>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl PostedLineQuery {
    pub fn for_account(account_id: AccountId) -> Self {
        Self { account_ids: Some(vec![account_id]), ..Default::default() }
    }

    pub fn up_to(to: NaiveDate) -> Self {
        Self { to: Some(to), ..Default::default() }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from: Some(from), to: Some(to), ..Default::default() }
    }

    /// Lines dated strictly before `date`, dropping any other date bound
    pub fn before(mut self, date: NaiveDate) -> Self {
        self.from = None;
        self.to = None;
        self.before = Some(date);
        self
    }

    pub fn matches(&self, entry_date: NaiveDate, account_id: AccountId) -> bool {
        self.from.map_or(true, |from| entry_date >= from)
            && self.to.map_or(true, |to| entry_date <= to)
            && self.before.map_or(true, |before| entry_date < before)
            && self
                .account_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&account_id))
    }
}

/// Signed change to one account's `current_balance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    pub account_id: AccountId,
    pub amount: Decimal,
}

/// Nets signed per-line changes into one delta per account, sorted by id
///
/// A fixed account order keeps concurrent units from locking the same rows
/// in opposite orders.
pub fn net_deltas<I>(changes: I) -> Vec<BalanceDelta>
where
    I: IntoIterator<Item = (AccountId, Decimal)>,
{
    let mut netted: BTreeMap<AccountId, Decimal> = BTreeMap::new();
    for (account_id, amount) in changes {
        *netted.entry(account_id).or_insert(Decimal::ZERO) += amount;
    }
    netted
        .into_iter()
        .map(|(account_id, amount)| BalanceDelta { account_id, amount })
        .collect()
}

/// Draft to Posted for one entry, with its balance changes
#[derive(Debug, Clone)]
pub struct PostingCommit {
    pub entry_id: JournalEntryId,
    /// The entry version the deltas were computed from
    pub expected_version: i64,
    pub deltas: Vec<BalanceDelta>,
    pub posted_by: UserId,
    pub posted_at: DateTime<Utc>,
}

/// Insert of a posted reversal, its balance changes and the original's
/// forward reference
#[derive(Debug, Clone)]
pub struct ReversalCommit {
    pub original_id: JournalEntryId,
    pub original_version: i64,
    pub reversal: NewEntryRecord,
    pub deltas: Vec<BalanceDelta>,
}

/// Result of a committed posting
#[derive(Debug, Clone)]
pub struct PostedRecord {
    pub entry: JournalEntry,
    /// Touched accounts after the change, in delta order
    pub accounts: Vec<Account>,
}

/// Result of a committed reversal
#[derive(Debug, Clone)]
pub struct ReversalRecord {
    pub original: JournalEntry,
    pub reversal: JournalEntry,
    pub accounts: Vec<Account>,
}

/// Chart of accounts storage
#[async_trait]
pub trait AccountRepository: DomainPort + HealthCheckable {
    /// Inserts an account; a duplicate code is a `Conflict`
    async fn insert_account(&self, account: Account) -> Result<Account, PortError>;

    async fn get_account(&self, id: AccountId) -> Result<Account, PortError>;

    async fn find_account_by_code(&self, code: &str) -> Result<Option<Account>, PortError>;

    /// Lists accounts ordered by code
    async fn list_accounts(&self, query: AccountQuery) -> Result<Vec<Account>, PortError>;

    /// Persists name, description and parent; never status or balances
    async fn save_account_details(&self, account: Account) -> Result<Account, PortError>;

    /// Active to Inactive, with the guards checked inside the unit
    ///
    /// `Conflict` unless the account is active, holds a zero balance and has
    /// no active children.
    async fn deactivate_account(&self, id: AccountId, at: DateTime<Utc>) -> Result<Account, PortError>;

    /// Inactive to Active; `Conflict` unless the account is inactive and its
    /// parent, if any, is active
    async fn reactivate_account(&self, id: AccountId, at: DateTime<Utc>) -> Result<Account, PortError>;

    async fn delete_account(&self, id: AccountId) -> Result<(), PortError>;

    /// Atomically adds `delta` to `current_balance` and returns the new balance
    ///
    /// `Conflict` if the account is a header or inactive when the change is applied.
    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, PortError>;
}

/// Journal entry storage
#[async_trait]
pub trait JournalStore: DomainPort + HealthCheckable {
    /// Allocates the next entry number and inserts the entry in one step
    async fn insert_entry(&self, record: NewEntryRecord) -> Result<JournalEntry, PortError>;

    async fn get_entry(&self, id: JournalEntryId) -> Result<JournalEntry, PortError>;

    /// Entries matching the query, ordered by entry date then number
    async fn find_entries(&self, query: JournalQuery) -> Result<Vec<JournalEntry>, PortError>;

    /// Replaces a draft's header and lines, bumping its version
    ///
    /// `Conflict` unless the stored entry is still a draft at `expected_version`.
    async fn update_draft(
        &self,
        entry: JournalEntry,
        expected_version: i64,
    ) -> Result<JournalEntry, PortError>;

    /// Deletes a draft; `Conflict` unless it is still a draft at `expected_version`
    async fn delete_draft(&self, id: JournalEntryId, expected_version: i64) -> Result<(), PortError>;

    /// Posted lines ordered by entry date, entry number, line position
    async fn posted_lines(&self, query: PostedLineQuery) -> Result<Vec<PostedLine>, PortError>;

    /// Whether any entry, draft or posted, has a line against the account
    async fn account_has_lines(&self, id: AccountId) -> Result<bool, PortError>;
}

/// Full ledger storage with atomic posting and reversal
#[async_trait]
pub trait LedgerStore: AccountRepository + JournalStore {
    /// Applies the deltas and marks the entry posted, all or nothing
    ///
    /// Guards checked inside the unit: the entry is a draft at
    /// `expected_version`; every delta account exists, is active and is not
    /// a header.
    async fn commit_posting(&self, commit: PostingCommit) -> Result<PostedRecord, PortError>;

    /// Inserts the posted reversal, applies its deltas and links the
    /// original to it, all or nothing
    ///
    /// Guards checked inside the unit: the original is posted, not yet
    /// reversed and at `original_version`; every delta account is postable.
    async fn commit_reversal(&self, commit: ReversalCommit) -> Result<ReversalRecord, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_net_deltas_merges_and_sorts() {
        let a = AccountId::new();
        let b = AccountId::new();
        let deltas = net_deltas(vec![(a, dec!(100)), (b, dec!(-40)), (a, dec!(-30))]);
        assert_eq!(deltas.len(), 2);
        assert!(deltas[0].account_id < deltas[1].account_id);
        let for_a = deltas.iter().find(|d| d.account_id == a).unwrap();
        assert_eq!(for_a.amount, dec!(70));
    }

    #[test]
    fn test_posted_line_query_bounds() {
        let account = AccountId::new();
        let jan = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let query = PostedLineQuery::for_account(account).before(feb);
        assert!(query.matches(jan, account));
        assert!(!query.matches(feb, account));
        assert!(!query.matches(jan, AccountId::new()));
    }

    #[test]
    fn test_before_excludes_the_earliest_date() {
        let account = AccountId::new();
        let query = PostedLineQuery::for_account(account).before(NaiveDate::MIN);
        assert!(!query.matches(NaiveDate::MIN, account));

        let opening = PostedLineQuery::default().before(NaiveDate::MIN);
        let period = PostedLineQuery::between(NaiveDate::MIN, NaiveDate::MIN);
        let counted = [opening.matches(NaiveDate::MIN, account), period.matches(NaiveDate::MIN, account)];
        assert_eq!(counted, [false, true]);
    }
}
