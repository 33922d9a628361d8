//! Journal Entry Store
//!
//! Create, read, list, edit and delete of draft entries. Nothing here
//! touches account balances.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AccountId, JournalEntryId};

use crate::account::Account;
use crate::error::LedgerError;
use crate::journal::{
    number_lines, EntryStatus, JournalEntry, JournalQuery, NewEntryRecord, NewJournalEntry,
    UpdateJournalEntry,
};
use crate::policy::LedgerPolicy;
use crate::ports::LedgerStore;
use crate::validation::{validate_new_entry, validate_new_lines};

/// Draft journal entry operations
#[derive(Clone)]
pub struct JournalEntryStore {
    store: Arc<dyn LedgerStore>,
    policy: LedgerPolicy,
}

impl JournalEntryStore {
    pub fn new(store: Arc<dyn LedgerStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// Validates and stores a new draft entry
    ///
    /// # Errors
    ///
    /// - `Validation` with per-line detail when the lines are malformed or unbalanced
    /// - `AccountConstraint` when a line targets an unknown, header or inactive account
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn create(&self, request: NewJournalEntry) -> Result<JournalEntry, LedgerError> {
        if let Err(err) = validate_new_entry(&request, &self.policy) {
            warn!(error = %err, "journal entry rejected");
            return Err(err);
        }
        resolve_accounts(self.store.as_ref(), request.lines.iter().map(|l| l.account_id).collect::<Vec<_>>()).await?;

        let record = NewEntryRecord {
            id: JournalEntryId::new_v7(),
            number_prefix: self.policy.entry_number_prefix.clone(),
            entry_date: request.entry_date,
            entry_type: request.entry_type,
            description: request.description.trim().to_string(),
            reference_no: request.reference_no,
            status: EntryStatus::Draft,
            lines: number_lines(&request.lines),
            created_by: request.created_by,
            created_at: Utc::now(),
            posted_by: None,
            posted_at: None,
            reversed_entry_id: None,
        };
        let entry = self.store.insert_entry(record).await?;
        info!(entry_number = %entry.entry_number, "draft journal entry created");
        Ok(entry)
    }

    pub async fn get(&self, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        self.store
            .get_entry(id)
            .await
            .map_err(LedgerError::from_port("JournalEntry"))
    }

    pub async fn list(&self, query: JournalQuery) -> Result<Vec<JournalEntry>, LedgerError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(LedgerError::field("from", "must not be after 'to'"));
            }
        }
        debug!(?query, "listing journal entries");
        Ok(self.store.find_entries(query).await?)
    }

    /// Edits a draft; posted entries are immutable
    #[instrument(skip(self, update))]
    pub async fn update_draft(
        &self,
        id: JournalEntryId,
        update: UpdateJournalEntry,
    ) -> Result<JournalEntry, LedgerError> {
        let mut entry = self.get(id).await?;
        entry.ensure_draft("edit")?;
        let expected_version = update.expected_version.unwrap_or(entry.version);
        if expected_version != entry.version {
            return Err(LedgerError::concurrency(format!(
                "entry {} is at version {}, expected {}",
                entry.entry_number, entry.version, expected_version
            )));
        }

        if let Some(description) = update.description {
            if description.trim().is_empty() {
                return Err(LedgerError::field("description", "must not be empty"));
            }
            entry.description = description.trim().to_string();
        }
        if let Some(entry_date) = update.entry_date {
            entry.entry_date = entry_date;
        }
        if let Some(entry_type) = update.entry_type {
            entry.entry_type = entry_type;
        }
        if let Some(reference_no) = update.reference_no {
            entry.reference_no = reference_no;
        }
        if let Some(lines) = update.lines {
            validate_new_lines(&lines, &self.policy)?;
            resolve_accounts(self.store.as_ref(), lines.iter().map(|l| l.account_id).collect::<Vec<_>>()).await?;
            entry.lines = number_lines(&lines);
        }
        entry.updated_at = Utc::now();

        let entry = self
            .store
            .update_draft(entry, expected_version)
            .await
            .map_err(|e| self.stale_draft(id, e))?;
        info!(entry_number = %entry.entry_number, version = entry.version, updated_by = %update.updated_by, "draft updated");
        Ok(entry)
    }

    /// Deletes a draft; posted entries are never deleted
    #[instrument(skip(self))]
    pub async fn delete_draft(
        &self,
        id: JournalEntryId,
        expected_version: Option<i64>,
    ) -> Result<(), LedgerError> {
        let entry = self.get(id).await?;
        entry.ensure_draft("delete")?;
        self.store
            .delete_draft(id, expected_version.unwrap_or(entry.version))
            .await
            .map_err(|e| self.stale_draft(id, e))?;
        info!(entry_number = %entry.entry_number, "draft deleted");
        Ok(())
    }

    fn stale_draft(&self, id: JournalEntryId, error: core_kernel::PortError) -> LedgerError {
        warn!(entry_id = %id, error = %error, "draft changed underneath update");
        LedgerError::from_port("JournalEntry")(error)
    }
}

/// Loads every distinct account referenced by `ids` and checks it can be posted to
pub(crate) async fn resolve_accounts<I>(
    store: &dyn LedgerStore,
    ids: I,
) -> Result<HashMap<AccountId, Account>, LedgerError>
where
    I: IntoIterator<Item = AccountId>,
{
    let mut accounts = HashMap::new();
    for id in ids {
        if accounts.contains_key(&id) {
            continue;
        }
        let account = store.get_account(id).await.map_err(|e| {
            if e.is_not_found() {
                LedgerError::account(format!("unknown account {}", id))
            } else {
                LedgerError::from(e)
            }
        })?;
        account.ensure_postable()?;
        accounts.insert(id, account);
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::UserId;
    use rust_decimal_macros::dec;

    use crate::account::{AccountType, NewAccount};
    use crate::adapters::InMemoryLedgerStore;
    use crate::journal::{EntryType, NewJournalLine};
    use crate::registry::AccountRegistry;

    struct Setup {
        entries: JournalEntryStore,
        cash: Account,
        sales: Account,
        header: Account,
        user: UserId,
    }

    async fn setup() -> Setup {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let registry = AccountRegistry::new(store.clone());
        let user = UserId::new();
        let header = registry
            .create_account(NewAccount::new("1000", "Assets", AccountType::Asset).header(), user)
            .await
            .unwrap();
        let cash = registry
            .create_account(NewAccount::new("1100", "Cash", AccountType::Asset), user)
            .await
            .unwrap();
        let sales = registry
            .create_account(NewAccount::new("4100", "Sales", AccountType::Revenue), user)
            .await
            .unwrap();
        Setup {
            entries: JournalEntryStore::new(store, LedgerPolicy::default()),
            cash,
            sales,
            header,
            user,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn sale(s: &Setup, day: u32, amount: rust_decimal::Decimal) -> NewJournalEntry {
        NewJournalEntry::new(date(day), EntryType::Sales, "Cash sale", s.user)
            .debit(s.cash.id, amount)
            .credit(s.sales.id, amount)
    }

    #[tokio::test]
    async fn test_entry_numbers_are_sequential() {
        let s = setup().await;
        let first = s.entries.create(sale(&s, 1, dec!(10))).await.unwrap();
        let second = s.entries.create(sale(&s, 2, dec!(20))).await.unwrap();
        assert_eq!(first.entry_number, "JE-000001");
        assert_eq!(second.entry_number, "JE-000002");
        assert_eq!(first.status, EntryStatus::Draft);
    }

    #[tokio::test]
    async fn test_header_line_rejected_at_create() {
        let s = setup().await;
        let request = NewJournalEntry::new(date(1), EntryType::Manual, "Bad", s.user)
            .debit(s.header.id, dec!(10))
            .credit(s.sales.id, dec!(10));
        let err = s.entries.create(request).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountConstraint(_)));
    }

    #[tokio::test]
    async fn test_unknown_account_rejected() {
        let s = setup().await;
        let request = NewJournalEntry::new(date(1), EntryType::Manual, "Ghost", s.user)
            .debit(AccountId::new(), dec!(10))
            .credit(s.sales.id, dec!(10));
        let err = s.entries.create(request).await.unwrap_err();
        assert!(err.to_string().contains("unknown account"));
    }

    #[tokio::test]
    async fn test_update_draft_replaces_lines() {
        let s = setup().await;
        let entry = s.entries.create(sale(&s, 1, dec!(10))).await.unwrap();

        let mut update = UpdateJournalEntry::by(s.user);
        update.expected_version = Some(entry.version);
        update.lines = Some(vec![
            NewJournalLine::debit(s.cash.id, dec!(25)),
            NewJournalLine::credit(s.sales.id, dec!(25)),
        ]);
        let updated = s.entries.update_draft(entry.id, update).await.unwrap();
        assert_eq!(updated.version, entry.version + 1);
        assert_eq!(updated.total_debit(), dec!(25));
        assert_eq!(updated.entry_number, entry.entry_number);
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let s = setup().await;
        let entry = s.entries.create(sale(&s, 1, dec!(10))).await.unwrap();
        let mut update = UpdateJournalEntry::by(s.user);
        update.expected_version = Some(entry.version + 3);
        update.description = Some("Edited".into());
        let err = s.entries.update_draft(entry.id, update).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let s = setup().await;
        s.entries.create(sale(&s, 1, dec!(10))).await.unwrap();
        s.entries
            .create(sale(&s, 20, dec!(20)).with_reference("INV-20"))
            .await
            .unwrap();

        let found = s.entries.list(JournalQuery::between(date(10), date(31))).await.unwrap();
        assert_eq!(found.len(), 1);

        let found = s.entries.list(JournalQuery::default().search("inv-20")).await.unwrap();
        assert_eq!(found.len(), 1);

        let page = s.entries.list(JournalQuery::default().paginate(1, 1)).await.unwrap();
        assert_eq!(page[0].entry_date, date(20));

        assert!(s.entries.list(JournalQuery::between(date(31), date(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_draft() {
        let s = setup().await;
        let entry = s.entries.create(sale(&s, 1, dec!(10))).await.unwrap();
        s.entries.delete_draft(entry.id, None).await.unwrap();
        assert!(matches!(
            s.entries.get(entry.id).await.unwrap_err(),
            LedgerError::NotFound { entity: "JournalEntry", .. }
        ));
    }
}
