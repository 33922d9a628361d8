//! Posting Engine
//!
//! The only path from a draft's lines to account balances. The balance
//! changes and the Draft to Posted flip are committed as one unit by the
//! store; if anything fails no balance moves and the entry stays a draft.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{AccountId, JournalEntryId, PortError, UserId};

use crate::account::Account;
use crate::entries::resolve_accounts;
use crate::error::LedgerError;
use crate::journal::{JournalEntry, JournalLine};
use crate::policy::LedgerPolicy;
use crate::ports::{net_deltas, BalanceDelta, LedgerStore, PostingCommit};
use crate::validation::validate_stored_lines;

/// An account balance after a posting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub code: String,
    pub current_balance: Decimal,
}

impl From<&Account> for AccountBalance {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            current_balance: account.current_balance,
        }
    }
}

/// The posted entry and the balances it changed
#[derive(Debug, Clone, Serialize)]
pub struct PostingResult {
    pub entry: JournalEntry,
    pub balances: Vec<AccountBalance>,
}

#[derive(Clone)]
pub struct PostingEngine {
    store: Arc<dyn LedgerStore>,
    policy: LedgerPolicy,
}

impl PostingEngine {
    pub fn new(store: Arc<dyn LedgerStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// Posts a draft entry
    ///
    /// # Arguments
    ///
    /// * `entry_id` - The draft to post
    /// * `posted_by` - Audit identity of the caller
    ///
    /// # Errors
    ///
    /// - `NotFound` if the entry does not exist
    /// - `InvalidState` if it is already posted
    /// - `Validation` if its lines no longer balance
    /// - `AccountConstraint` for a header, inactive or unknown account
    /// - `Concurrency` if the entry or an account changed during the commit
    pub async fn post(
        &self,
        entry_id: JournalEntryId,
        posted_by: UserId,
    ) -> Result<PostingResult, LedgerError> {
        self.post_expecting(entry_id, posted_by, None).await
    }

    /// Posts a draft only if it is still at `expected_version`
    #[instrument(skip(self))]
    pub async fn post_expecting(
        &self,
        entry_id: JournalEntryId,
        posted_by: UserId,
        expected_version: Option<i64>,
    ) -> Result<PostingResult, LedgerError> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await
            .map_err(LedgerError::from_port("JournalEntry"))?;

        if entry.is_posted() {
            warn!(entry_number = %entry.entry_number, "attempt to post an already posted entry");
            return Err(LedgerError::invalid_state(format!(
                "entry {} is already posted",
                entry.entry_number
            )));
        }
        if let Some(expected) = expected_version {
            if expected != entry.version {
                return Err(LedgerError::concurrency(format!(
                    "entry {} is at version {}, expected {}",
                    entry.entry_number, entry.version, expected
                )));
            }
        }

        validate_stored_lines(&entry.lines, &self.policy)?;
        let accounts =
            resolve_accounts(self.store.as_ref(), entry.lines.iter().map(|l| l.account_id).collect::<Vec<_>>()).await?;
        let deltas = line_deltas(&entry.lines, &accounts)?;

        let commit = PostingCommit {
            entry_id,
            expected_version: entry.version,
            deltas,
            posted_by,
            posted_at: Utc::now(),
        };
        let record = match self.store.commit_posting(commit).await {
            Ok(record) => record,
            Err(error) => return Err(self.explain_failed_commit(entry_id, error).await),
        };

        info!(
            entry_number = %record.entry.entry_number,
            lines = record.entry.lines.len(),
            amount = %record.entry.total_debit(),
            posted_by = %posted_by,
            "journal entry posted"
        );
        Ok(PostingResult {
            balances: record.accounts.iter().map(AccountBalance::from).collect(),
            entry: record.entry,
        })
    }

    /// A lost race with another poster surfaces as InvalidState, anything
    /// else that moved underneath us as Concurrency
    async fn explain_failed_commit(&self, entry_id: JournalEntryId, error: PortError) -> LedgerError {
        if !error.is_conflict() {
            return LedgerError::from_port("JournalEntry")(error);
        }
        match self.store.get_entry(entry_id).await {
            Ok(current) if current.is_posted() => {
                warn!(entry_number = %current.entry_number, "entry posted concurrently");
                LedgerError::invalid_state(format!(
                    "entry {} is already posted",
                    current.entry_number
                ))
            }
            _ => {
                warn!(entry_id = %entry_id, error = %error, "posting conflict");
                LedgerError::from(error)
            }
        }
    }
}

/// One netted balance change per account, signed by each account's normal balance
pub(crate) fn line_deltas(
    lines: &[JournalLine],
    accounts: &HashMap<AccountId, Account>,
) -> Result<Vec<BalanceDelta>, LedgerError> {
    let changes = lines
        .iter()
        .map(|line| {
            accounts
                .get(&line.account_id)
                .map(|account| (line.account_id, account.signed_delta(line.debit, line.credit)))
                .ok_or_else(|| LedgerError::account(format!("unknown account {}", line.account_id)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(net_deltas(changes))
}
