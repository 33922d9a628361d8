//! In-memory ledger store
//!
//! All state sits behind one `RwLock`. Every unit of work (entry insert with
//! number allocation, posting, reversal) runs under a single write guard, so
//! units are serialised and a failed guard leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use core_kernel::{
    AccountId, DomainPort, HealthCheckResult, HealthCheckable, JournalEntryId, PortError,
};

use crate::account::{Account, AccountStatus};
use crate::journal::{EntryStatus, JournalEntry, JournalQuery, NewEntryRecord};
use crate::ports::{
    AccountQuery, AccountRepository, BalanceDelta, JournalStore, LedgerStore, PostedLine,
    PostedLineQuery, PostedRecord, PostingCommit, ReversalCommit, ReversalRecord,
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<JournalEntryId, JournalEntry>,
    last_sequence: i64,
}

impl State {
    fn account(&self, id: AccountId) -> Result<&Account, PortError> {
        self.accounts
            .get(&id)
            .ok_or_else(|| PortError::not_found("Account", id))
    }

    fn entry(&self, id: JournalEntryId) -> Result<&JournalEntry, PortError> {
        self.entries
            .get(&id)
            .ok_or_else(|| PortError::not_found("JournalEntry", id))
    }

    fn check_deltas(&self, deltas: &[BalanceDelta]) -> Result<(), PortError> {
        for delta in deltas {
            let account = self.account(delta.account_id)?;
            if account.is_header || !account.is_active() {
                return Err(PortError::conflict(format!(
                    "account {} is no longer postable",
                    account.code
                )));
            }
            if account.current_balance.checked_add(delta.amount).is_none() {
                return Err(PortError::validation_field("balance overflow", "amount"));
            }
        }
        Ok(())
    }

    /// Callers must run `check_deltas` first
    fn apply_deltas(&mut self, deltas: &[BalanceDelta]) -> Vec<Account> {
        let now = Utc::now();
        deltas
            .iter()
            .filter_map(|delta| {
                self.accounts.get_mut(&delta.account_id).map(|account| {
                    account.current_balance += delta.amount;
                    account.updated_at = now;
                    account.clone()
                })
            })
            .collect()
    }

    fn insert(&mut self, record: NewEntryRecord) -> JournalEntry {
        self.last_sequence += 1;
        let entry = record.into_entry(self.last_sequence);
        self.entries.insert(entry.id, entry.clone());
        entry
    }

    fn draft_at(&self, id: JournalEntryId, expected_version: i64) -> Result<&JournalEntry, PortError> {
        let entry = self.entry(id)?;
        if entry.status != EntryStatus::Draft {
            return Err(PortError::conflict(format!(
                "entry {} is no longer a draft",
                entry.entry_number
            )));
        }
        if entry.version != expected_version {
            return Err(PortError::conflict(format!(
                "entry {} is at version {}, expected {}",
                entry.entry_number, entry.version, expected_version
            )));
        }
        Ok(entry)
    }
}

/// Ledger store held entirely in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-ledger-store", 0)
    }
}

#[async_trait]
impl AccountRepository for InMemoryLedgerStore {
    async fn insert_account(&self, account: Account) -> Result<Account, PortError> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.code == account.code) {
            return Err(PortError::conflict(format!(
                "account code {} already exists",
                account.code
            )));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, PortError> {
        self.state.read().await.account(id).cloned()
    }

    async fn find_account_by_code(&self, code: &str) -> Result<Option<Account>, PortError> {
        Ok(self
            .state
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.code == code)
            .cloned())
    }

    async fn list_accounts(&self, query: AccountQuery) -> Result<Vec<Account>, PortError> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn save_account_details(&self, account: Account) -> Result<Account, PortError> {
        let mut state = self.state.write().await;
        let stored = state
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| PortError::not_found("Account", account.id))?;
        stored.name = account.name;
        stored.description = account.description;
        stored.parent_id = account.parent_id;
        stored.updated_at = account.updated_at;
        Ok(stored.clone())
    }

    async fn deactivate_account(&self, id: AccountId, at: DateTime<Utc>) -> Result<Account, PortError> {
        let mut state = self.state.write().await;
        let account = state.account(id)?;
        if !account.is_active() {
            return Err(PortError::conflict(format!("account {} is already inactive", account.code)));
        }
        if !account.current_balance.is_zero() {
            return Err(PortError::conflict(format!(
                "account {} has a balance of {} and cannot be deactivated",
                account.code, account.current_balance
            )));
        }
        let active_children = state
            .accounts
            .values()
            .filter(|a| a.parent_id == Some(id) && a.is_active())
            .count();
        if active_children > 0 {
            return Err(PortError::conflict(format!(
                "account {} has {} active child accounts",
                account.code, active_children
            )));
        }

        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Account", id))?;
        account.status = AccountStatus::Inactive;
        account.updated_at = at;
        Ok(account.clone())
    }

    async fn reactivate_account(&self, id: AccountId, at: DateTime<Utc>) -> Result<Account, PortError> {
        let mut state = self.state.write().await;
        let account = state.account(id)?;
        if account.is_active() {
            return Err(PortError::conflict(format!("account {} is already active", account.code)));
        }
        if let Some(parent_id) = account.parent_id {
            let parent = state.account(parent_id)?;
            if !parent.is_active() {
                return Err(PortError::conflict(format!(
                    "parent account {} is inactive",
                    parent.code
                )));
            }
        }

        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Account", id))?;
        account.status = AccountStatus::Active;
        account.updated_at = at;
        Ok(account.clone())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.parent_id == Some(id)) {
            return Err(PortError::conflict("account has child accounts"));
        }
        if state
            .entries
            .values()
            .any(|e| e.lines.iter().any(|l| l.account_id == id))
        {
            return Err(PortError::conflict("account is referenced by journal lines"));
        }
        state
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::not_found("Account", id))
    }

    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, PortError> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Account", id))?;
        if account.is_header || !account.is_active() {
            return Err(PortError::conflict(format!("account {} is not postable", account.code)));
        }
        account.current_balance = account
            .current_balance
            .checked_add(delta)
            .ok_or_else(|| PortError::validation_field("balance overflow", "amount"))?;
        account.updated_at = Utc::now();
        Ok(account.current_balance)
    }
}

#[async_trait]
impl JournalStore for InMemoryLedgerStore {
    async fn insert_entry(&self, record: NewEntryRecord) -> Result<JournalEntry, PortError> {
        let mut state = self.state.write().await;
        Ok(state.insert(record))
    }

    async fn get_entry(&self, id: JournalEntryId) -> Result<JournalEntry, PortError> {
        self.state.read().await.entry(id).cloned()
    }

    async fn find_entries(&self, query: JournalQuery) -> Result<Vec<JournalEntry>, PortError> {
        let state = self.state.read().await;
        let mut entries: Vec<JournalEntry> = state
            .entries
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.entry_date, e.sequence));

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_draft(
        &self,
        entry: JournalEntry,
        expected_version: i64,
    ) -> Result<JournalEntry, PortError> {
        let mut state = self.state.write().await;
        state.draft_at(entry.id, expected_version)?;
        let updated = JournalEntry {
            version: expected_version + 1,
            status: EntryStatus::Draft,
            ..entry
        };
        state.entries.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_draft(&self, id: JournalEntryId, expected_version: i64) -> Result<(), PortError> {
        let mut state = self.state.write().await;
        state.draft_at(id, expected_version)?;
        state.entries.remove(&id);
        Ok(())
    }

    async fn posted_lines(&self, query: PostedLineQuery) -> Result<Vec<PostedLine>, PortError> {
        let state = self.state.read().await;
        let mut lines: Vec<PostedLine> = state
            .entries
            .values()
            .filter(|e| e.is_posted())
            .flat_map(|e| {
                e.lines
                    .iter()
                    .filter(|l| query.matches(e.entry_date, l.account_id))
                    .map(move |l| PostedLine::from_entry(e, l))
            })
            .collect();
        lines.sort_by_key(PostedLine::sort_key);
        Ok(lines)
    }

    async fn account_has_lines(&self, id: AccountId) -> Result<bool, PortError> {
        Ok(self
            .state
            .read()
            .await
            .entries
            .values()
            .any(|e| e.lines.iter().any(|l| l.account_id == id)))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit_posting(&self, commit: PostingCommit) -> Result<PostedRecord, PortError> {
        let mut state = self.state.write().await;
        state.draft_at(commit.entry_id, commit.expected_version)?;
        state.check_deltas(&commit.deltas)?;

        let accounts = state.apply_deltas(&commit.deltas);
        let entry = state
            .entries
            .get_mut(&commit.entry_id)
            .ok_or_else(|| PortError::not_found("JournalEntry", commit.entry_id))?;
        entry.status = EntryStatus::Posted;
        entry.posted_by = Some(commit.posted_by);
        entry.posted_at = Some(commit.posted_at);
        entry.updated_at = commit.posted_at;
        entry.version += 1;

        Ok(PostedRecord { entry: entry.clone(), accounts })
    }

    async fn commit_reversal(&self, commit: ReversalCommit) -> Result<ReversalRecord, PortError> {
        let mut state = self.state.write().await;
        let original = state.entry(commit.original_id)?;
        if original.status != EntryStatus::Posted {
            return Err(PortError::conflict(format!(
                "entry {} is not posted",
                original.entry_number
            )));
        }
        if original.reversal_entry_id.is_some() {
            return Err(PortError::conflict(format!(
                "entry {} is already reversed",
                original.entry_number
            )));
        }
        if original.version != commit.original_version {
            return Err(PortError::conflict(format!(
                "entry {} is at version {}, expected {}",
                original.entry_number, original.version, commit.original_version
            )));
        }
        state.check_deltas(&commit.deltas)?;

        let reversal = state.insert(commit.reversal);
        let accounts = state.apply_deltas(&commit.deltas);
        let original = state
            .entries
            .get_mut(&commit.original_id)
            .ok_or_else(|| PortError::not_found("JournalEntry", commit.original_id))?;
        original.reversal_entry_id = Some(reversal.id);
        original.updated_at = reversal.created_at;
        original.version += 1;

        Ok(ReversalRecord { original: original.clone(), reversal, accounts })
    }
}
