//! PostgreSQL ledger adapter
//!
//! Every multi-row change runs in one transaction. Posting and reversal lock
//! the entry row first and then the touched account rows in id order, and
//! re-check their guards under those locks. A guard that fails is reported as
//! `PortError::Conflict` and the transaction is rolled back on drop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    AccountId, DomainPort, HealthCheckResult, HealthCheckable, JournalEntryId, PortError,
};
use domain_ledger::account::Account;
use domain_ledger::journal::{EntryStatus, JournalEntry, JournalQuery, NewEntryRecord};
use domain_ledger::ports::{
    AccountQuery, AccountRepository, BalanceDelta, JournalStore, LedgerStore, PostedLine,
    PostedLineQuery, PostedRecord, PostingCommit, ReversalCommit, ReversalRecord,
};

use crate::error::DatabaseError;
use crate::repositories::{account, journal, AccountRow, DbAccountStatus, DbEntryStatus, EntryRow};

const ADAPTER_ID: &str = "postgres-ledger-store";

/// Ledger storage on a PostgreSQL pool
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - unique violations and serialization failures -> `PortError::Conflict`
/// - numeric overflow -> `PortError::Validation` on `amount`
/// - connection and pool failures -> `PortError::Connection` / `Timeout`
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new adapter over `pool`
    ///
    /// The schema must already be migrated, see [`crate::run_migrations`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, PortError> {
        self.pool.begin().await.map_err(|e| PortError::from(DatabaseError::from(e)))
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, PortError> {
        self.pool.acquire().await.map_err(|e| PortError::from(DatabaseError::from(e)))
    }
}

fn entry_not_found(id: impl std::fmt::Display) -> PortError {
    PortError::not_found("JournalEntry", id)
}

/// Checks a locked entry row is a draft at `expected_version`
fn ensure_draft_at(row: &EntryRow, expected_version: i64) -> Result<(), PortError> {
    if row.status != DbEntryStatus::Draft {
        return Err(PortError::conflict(format!(
            "entry {} is no longer a draft",
            row.entry_number
        )));
    }
    if row.version != expected_version {
        return Err(PortError::conflict(format!(
            "entry {} is at version {}, expected {}",
            row.entry_number, row.version, expected_version
        )));
    }
    Ok(())
}

/// Locks the delta accounts, checks they are postable and applies the deltas
///
/// Returns the updated accounts in delta order.
async fn apply_deltas(conn: &mut PgConnection, deltas: &[BalanceDelta]) -> Result<Vec<Account>, PortError> {
    let mut ids: Vec<Uuid> = deltas.iter().map(|d| Uuid::from(d.account_id)).collect();
    ids.sort();
    let locked: HashMap<Uuid, AccountRow> = account::lock_for_update(conn, &ids)
        .await?
        .into_iter()
        .map(|row| (row.account_id, row))
        .collect();

    for delta in deltas {
        let row = locked
            .get(delta.account_id.as_uuid())
            .ok_or_else(|| PortError::not_found("Account", delta.account_id))?;
        if row.is_header || row.status != DbAccountStatus::Active {
            return Err(PortError::conflict(format!(
                "account {} is no longer postable",
                row.code
            )));
        }
    }

    let now = Utc::now();
    let mut accounts = Vec::with_capacity(deltas.len());
    for delta in deltas {
        let row = account::add_to_balance(conn, Uuid::from(delta.account_id), delta.amount, now)
            .await?
            .ok_or_else(|| PortError::not_found("Account", delta.account_id))?;
        accounts.push(Account::from(row));
    }
    Ok(accounts)
}

/// Allocates the next number and writes the entry with its lines
async fn insert_record(conn: &mut PgConnection, record: NewEntryRecord) -> Result<JournalEntry, PortError> {
    let sequence = journal::next_sequence(conn).await?;
    let entry = record.into_entry(sequence);
    journal::insert_entry(conn, &entry).await?;
    journal::insert_lines(conn, *entry.id.as_uuid(), &entry.lines).await?;
    Ok(entry)
}

async fn lock_account(conn: &mut PgConnection, id: AccountId) -> Result<AccountRow, PortError> {
    account::lock_for_update(conn, &[Uuid::from(id)])
        .await?
        .pop()
        .ok_or_else(|| PortError::not_found("Account", id))
}

async fn load_entry(conn: &mut PgConnection, row: EntryRow) -> Result<JournalEntry, PortError> {
    let mut entries = journal::hydrate(conn, vec![row]).await?;
    entries.pop().ok_or_else(|| PortError::internal("entry vanished while loading lines"))
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Runs `SELECT 1` against the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => {
                warn!(error = %e, "Ledger database health check failed");
                HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e))
            }
        }
    }
}

#[async_trait]
impl AccountRepository for PostgresLedgerStore {
    #[instrument(skip(self, new_account), fields(code = %new_account.code))]
    async fn insert_account(&self, new_account: Account) -> Result<Account, PortError> {
        let mut conn = self.acquire().await?;
        let row = account::insert(&mut conn, &new_account).await?;
        debug!(account_id = %new_account.id, "Account inserted");
        Ok(Account::from(row))
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, PortError> {
        let mut conn = self.acquire().await?;
        account::find_by_id(&mut conn, Uuid::from(id))
            .await?
            .map(Account::from)
            .ok_or_else(|| PortError::not_found("Account", id))
    }

    async fn find_account_by_code(&self, code: &str) -> Result<Option<Account>, PortError> {
        let mut conn = self.acquire().await?;
        Ok(account::find_by_code(&mut conn, code).await?.map(Account::from))
    }

    async fn list_accounts(&self, query: AccountQuery) -> Result<Vec<Account>, PortError> {
        let mut conn = self.acquire().await?;
        let rows = account::list(&mut conn, &query).await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    #[instrument(skip(self, details), fields(account_id = %details.id))]
    async fn save_account_details(&self, details: Account) -> Result<Account, PortError> {
        let mut conn = self.acquire().await?;
        account::update_details(&mut conn, &details)
            .await?
            .map(Account::from)
            .ok_or_else(|| PortError::not_found("Account", details.id))
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn delete_account(&self, id: AccountId) -> Result<(), PortError> {
        let mut tx = self.begin().await?;
        let uuid = Uuid::from(id);
        lock_account(&mut tx, id).await?;
        if account::has_children(&mut tx, uuid).await? {
            return Err(PortError::conflict("account has child accounts"));
        }
        if journal::account_has_lines(&mut tx, uuid).await? {
            return Err(PortError::conflict("account is referenced by journal lines"));
        }
        account::delete(&mut tx, uuid).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Account deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn deactivate_account(&self, id: AccountId, at: DateTime<Utc>) -> Result<Account, PortError> {
        let mut tx = self.begin().await?;
        let uuid = Uuid::from(id);
        let row = lock_account(&mut tx, id).await?;
        if row.status != DbAccountStatus::Active {
            return Err(PortError::conflict(format!("account {} is already inactive", row.code)));
        }
        if !row.current_balance.is_zero() {
            return Err(PortError::conflict(format!(
                "account {} has a balance of {} and cannot be deactivated",
                row.code, row.current_balance
            )));
        }
        if account::has_active_children(&mut tx, uuid).await? {
            return Err(PortError::conflict(format!(
                "account {} has active child accounts",
                row.code
            )));
        }
        let updated = account::deactivate(&mut tx, uuid, at)
            .await?
            .ok_or_else(|| PortError::conflict(format!("account {} changed during deactivation", row.code)))?;
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Account deactivated");
        Ok(Account::from(updated))
    }

    /// Locks the account and then its parent, so a concurrent deactivation
    /// of the parent is seen
    #[instrument(skip(self), fields(account_id = %id))]
    async fn reactivate_account(&self, id: AccountId, at: DateTime<Utc>) -> Result<Account, PortError> {
        let mut tx = self.begin().await?;
        let row = lock_account(&mut tx, id).await?;
        if row.status == DbAccountStatus::Active {
            return Err(PortError::conflict(format!("account {} is already active", row.code)));
        }
        if let Some(parent_id) = row.parent_id {
            let parent = lock_account(&mut tx, AccountId::from_uuid(parent_id)).await?;
            if parent.status != DbAccountStatus::Active {
                return Err(PortError::conflict(format!(
                    "parent account {} is inactive",
                    parent.code
                )));
            }
        }
        let updated = account::reactivate(&mut tx, Uuid::from(id), at)
            .await?
            .ok_or_else(|| PortError::conflict(format!("account {} changed during reactivation", row.code)))?;
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Account reactivated");
        Ok(Account::from(updated))
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, PortError> {
        let mut tx = self.begin().await?;
        let row = lock_account(&mut tx, id).await?;
        if row.is_header || row.status != DbAccountStatus::Active {
            return Err(PortError::conflict(format!("account {} is not postable", row.code)));
        }
        let balance = account::add_to_balance(&mut tx, Uuid::from(id), delta, Utc::now())
            .await?
            .map(|row| row.current_balance)
            .ok_or_else(|| PortError::not_found("Account", id))?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(balance)
    }
}

#[async_trait]
impl JournalStore for PostgresLedgerStore {
    #[instrument(skip(self, record), fields(entry_id = %record.id))]
    async fn insert_entry(&self, record: NewEntryRecord) -> Result<JournalEntry, PortError> {
        let mut tx = self.begin().await?;
        let entry = insert_record(&mut tx, record).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!(entry_number = %entry.entry_number, "Journal entry inserted");
        Ok(entry)
    }

    async fn get_entry(&self, id: JournalEntryId) -> Result<JournalEntry, PortError> {
        let mut conn = self.acquire().await?;
        let row = journal::find_entry(&mut conn, Uuid::from(id))
            .await?
            .ok_or_else(|| entry_not_found(id))?;
        load_entry(&mut conn, row).await
    }

    async fn find_entries(&self, query: JournalQuery) -> Result<Vec<JournalEntry>, PortError> {
        let mut conn = self.acquire().await?;
        let rows = journal::find_entries(&mut conn, &query).await?;
        Ok(journal::hydrate(&mut conn, rows).await?)
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    async fn update_draft(
        &self,
        entry: JournalEntry,
        expected_version: i64,
    ) -> Result<JournalEntry, PortError> {
        let mut tx = self.begin().await?;
        let uuid = Uuid::from(entry.id);
        let row = journal::lock_entry(&mut tx, uuid)
            .await?
            .ok_or_else(|| entry_not_found(entry.id))?;
        ensure_draft_at(&row, expected_version)?;

        let updated = JournalEntry {
            version: expected_version + 1,
            status: EntryStatus::Draft,
            ..entry
        };
        journal::update_header(&mut tx, &updated).await?;
        journal::delete_lines(&mut tx, uuid).await?;
        journal::insert_lines(&mut tx, uuid, &updated.lines).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    async fn delete_draft(&self, id: JournalEntryId, expected_version: i64) -> Result<(), PortError> {
        let mut tx = self.begin().await?;
        let uuid = Uuid::from(id);
        let row = journal::lock_entry(&mut tx, uuid)
            .await?
            .ok_or_else(|| entry_not_found(id))?;
        ensure_draft_at(&row, expected_version)?;
        journal::delete_entry(&mut tx, uuid).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn posted_lines(&self, query: PostedLineQuery) -> Result<Vec<PostedLine>, PortError> {
        let mut conn = self.acquire().await?;
        let rows = journal::posted_lines(&mut conn, &query).await?;
        rows.into_iter()
            .map(|row| PostedLine::try_from(row).map_err(PortError::from))
            .collect()
    }

    async fn account_has_lines(&self, id: AccountId) -> Result<bool, PortError> {
        let mut conn = self.acquire().await?;
        Ok(journal::account_has_lines(&mut conn, Uuid::from(id)).await?)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, commit), fields(entry_id = %commit.entry_id, accounts = commit.deltas.len()))]
    async fn commit_posting(&self, commit: PostingCommit) -> Result<PostedRecord, PortError> {
        let mut tx = self.begin().await?;
        let uuid = Uuid::from(commit.entry_id);
        let row = journal::lock_entry(&mut tx, uuid)
            .await?
            .ok_or_else(|| entry_not_found(commit.entry_id))?;
        ensure_draft_at(&row, commit.expected_version)?;

        let accounts = apply_deltas(&mut tx, &commit.deltas).await?;
        let posted = journal::mark_posted(
            &mut tx,
            uuid,
            Uuid::from(commit.posted_by),
            commit.posted_at,
        )
        .await?;
        let entry = load_entry(&mut tx, posted).await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        debug!(entry_number = %entry.entry_number, "Posting committed");
        Ok(PostedRecord { entry, accounts })
    }

    #[instrument(skip(self, commit), fields(original_id = %commit.original_id))]
    async fn commit_reversal(&self, commit: ReversalCommit) -> Result<ReversalRecord, PortError> {
        let mut tx = self.begin().await?;
        let original_uuid = Uuid::from(commit.original_id);
        let row = journal::lock_entry(&mut tx, original_uuid)
            .await?
            .ok_or_else(|| entry_not_found(commit.original_id))?;
        if row.status != DbEntryStatus::Posted {
            return Err(PortError::conflict(format!("entry {} is not posted", row.entry_number)));
        }
        if row.reversal_entry_id.is_some() {
            return Err(PortError::conflict(format!(
                "entry {} is already reversed",
                row.entry_number
            )));
        }
        if row.version != commit.original_version {
            return Err(PortError::conflict(format!(
                "entry {} is at version {}, expected {}",
                row.entry_number, row.version, commit.original_version
            )));
        }

        let accounts = apply_deltas(&mut tx, &commit.deltas).await?;
        let reversal = insert_record(&mut tx, commit.reversal).await?;
        let linked = journal::link_reversal(
            &mut tx,
            original_uuid,
            Uuid::from(reversal.id),
            reversal.created_at,
        )
        .await?;
        let original = load_entry(&mut tx, linked).await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        debug!(
            original = %original.entry_number,
            reversal = %reversal.entry_number,
            "Reversal committed"
        );
        Ok(ReversalRecord { original, reversal, accounts })
    }
}
