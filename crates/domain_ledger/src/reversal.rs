//! Reversal Engine
//!
//! Undoes a posted entry by posting its mirror image. The original is never
//! edited beyond its forward reference to the reversal. Creating the
//! reversal, posting it and linking the original happen in one store unit,
//! so a failed reversal leaves no orphaned entry behind.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{JournalEntryId, PortError, UserId};

use crate::entries::resolve_accounts;
use crate::error::LedgerError;
use crate::journal::{EntryStatus, JournalEntry, JournalLine, NewEntryRecord};
use crate::policy::LedgerPolicy;
use crate::ports::{LedgerStore, ReversalCommit};
use crate::posting::{line_deltas, AccountBalance};

/// Prefix of generated reversal line descriptions
pub const REVERSAL_LINE_PREFIX: &str = "Reversal: ";

/// The closed original, its posted reversal and the balances that moved
#[derive(Debug, Clone, Serialize)]
pub struct ReversalResult {
    pub original: JournalEntry,
    pub reversal: JournalEntry,
    pub balances: Vec<AccountBalance>,
}

#[derive(Clone)]
pub struct ReversalEngine {
    store: Arc<dyn LedgerStore>,
    policy: LedgerPolicy,
}

impl ReversalEngine {
    pub fn new(store: Arc<dyn LedgerStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// Reverses a posted entry
    ///
    /// # Arguments
    ///
    /// * `original_id` - The posted entry to undo
    /// * `created_by` - Audit identity; also recorded as the poster of the reversal
    /// * `reversal_date` - Entry date of the reversal; when `None`, today or
    ///   the original's date if that is later
    ///
    /// # Errors
    ///
    /// - `NotFound` if the original does not exist
    /// - `InvalidState` if it is a draft, already reversed, or itself a
    ///   reversal while the policy forbids chaining
    /// - `Validation` if a supplied `reversal_date` precedes the original's date
    #[instrument(skip(self))]
    pub async fn reverse(
        &self,
        original_id: JournalEntryId,
        created_by: UserId,
        reversal_date: Option<NaiveDate>,
    ) -> Result<ReversalResult, LedgerError> {
        let original = self
            .store
            .get_entry(original_id)
            .await
            .map_err(LedgerError::from_port("JournalEntry"))?;
        self.check_reversible(&original)?;

        let entry_date =
            reversal_entry_date(reversal_date, original.entry_date, Utc::now().date_naive())?;

        let lines = mirror_lines(&original);
        let accounts =
            resolve_accounts(self.store.as_ref(), lines.iter().map(|l| l.account_id).collect::<Vec<_>>()).await?;
        let deltas = line_deltas(&lines, &accounts)?;

        let now = Utc::now();
        let commit = ReversalCommit {
            original_id,
            original_version: original.version,
            reversal: NewEntryRecord {
                id: JournalEntryId::new_v7(),
                number_prefix: self.policy.entry_number_prefix.clone(),
                entry_date,
                entry_type: original.entry_type,
                description: format!("Reversal of {}", original.entry_number),
                reference_no: original.reference_no.clone(),
                status: EntryStatus::Posted,
                lines,
                created_by,
                created_at: now,
                posted_by: Some(created_by),
                posted_at: Some(now),
                reversed_entry_id: Some(original_id),
            },
            deltas,
        };

        let record = match self.store.commit_reversal(commit).await {
            Ok(record) => record,
            Err(error) => return Err(self.explain_failed_commit(original_id, error).await),
        };

        info!(
            original = %record.original.entry_number,
            reversal = %record.reversal.entry_number,
            lines = record.reversal.lines.len(),
            "journal entry reversed"
        );
        Ok(ReversalResult {
            balances: record.accounts.iter().map(AccountBalance::from).collect(),
            original: record.original,
            reversal: record.reversal,
        })
    }

    fn check_reversible(&self, original: &JournalEntry) -> Result<(), LedgerError> {
        let reason = if !original.is_posted() {
            Some("it is not posted")
        } else if original.is_closed() {
            Some("it has already been reversed")
        } else if original.is_reversal() && !self.policy.allow_reversal_of_reversal {
            Some("it is itself a reversal")
        } else {
            None
        };
        match reason {
            Some(reason) => {
                warn!(entry_number = %original.entry_number, reason, "reversal rejected");
                Err(LedgerError::invalid_state(format!(
                    "cannot reverse entry {}: {}",
                    original.entry_number, reason
                )))
            }
            None => Ok(()),
        }
    }

    async fn explain_failed_commit(&self, original_id: JournalEntryId, error: PortError) -> LedgerError {
        if !error.is_conflict() {
            return LedgerError::from_port("JournalEntry")(error);
        }
        match self.store.get_entry(original_id).await {
            Ok(current) if current.is_closed() => LedgerError::invalid_state(format!(
                "cannot reverse entry {}: it has already been reversed",
                current.entry_number
            )),
            _ => LedgerError::from(error),
        }
    }
}

/// Entry date for a reversal; a future-dated original is reversed on its own date by default
pub fn reversal_entry_date(
    requested: Option<NaiveDate>,
    original_date: NaiveDate,
    today: NaiveDate,
) -> Result<NaiveDate, LedgerError> {
    match requested {
        None => Ok(today.max(original_date)),
        Some(date) if date < original_date => Err(LedgerError::field(
            "reversal_date",
            format!("must not be earlier than the original entry date {}", original_date),
        )),
        Some(date) => Ok(date),
    }
}

/// The original's lines with debit and credit swapped, in the same order
pub fn mirror_lines(original: &JournalEntry) -> Vec<JournalLine> {
    original
        .lines
        .iter()
        .zip(1u32..)
        .map(|(line, line_no)| {
            let text = line.description.as_deref().unwrap_or(&original.description);
            line.mirrored(line_no, Some(format!("{}{}", REVERSAL_LINE_PREFIX, text)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{AccountId, JournalLineId};
    use rust_decimal_macros::dec;

    use crate::journal::EntryType;

    fn posted_entry() -> JournalEntry {
        let now = Utc::now();
        JournalEntry {
            id: JournalEntryId::new(),
            entry_number: "JE-000007".into(),
            sequence: 7,
            entry_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            entry_type: EntryType::Sales,
            description: "Sale".into(),
            reference_no: Some("INV-1".into()),
            status: EntryStatus::Posted,
            lines: vec![
                JournalLine {
                    id: JournalLineId::new(),
                    line_no: 1,
                    account_id: AccountId::new(),
                    debit: dec!(500),
                    credit: dec!(0),
                    description: Some("Till".into()),
                },
                JournalLine {
                    id: JournalLineId::new(),
                    line_no: 2,
                    account_id: AccountId::new(),
                    debit: dec!(0),
                    credit: dec!(500),
                    description: None,
                },
            ],
            created_by: UserId::new(),
            created_at: now,
            updated_at: now,
            posted_by: Some(UserId::new()),
            posted_at: Some(now),
            reversed_entry_id: None,
            reversal_entry_id: None,
            version: 2,
        }
    }

    #[test]
    fn test_mirror_lines() {
        let original = posted_entry();
        let mirrored = mirror_lines(&original);
        assert_eq!(mirrored[0].credit, dec!(500));
        assert_eq!(mirrored[0].debit, dec!(0));
        assert_eq!(mirrored[1].debit, dec!(500));
        assert_eq!(mirrored[0].description.as_deref(), Some("Reversal: Till"));
        assert_eq!(mirrored[1].description.as_deref(), Some("Reversal: Sale"));
        assert_eq!(mirrored[1].account_id, original.lines[1].account_id);
    }

    #[test]
    fn test_reversal_of_reversal_blocked_by_default() {
        let store: Arc<dyn LedgerStore> = Arc::new(crate::adapters::InMemoryLedgerStore::new());
        let mut entry = posted_entry();
        entry.reversed_entry_id = Some(JournalEntryId::new());

        let strict = ReversalEngine::new(store.clone(), LedgerPolicy::default());
        assert!(matches!(strict.check_reversible(&entry), Err(LedgerError::InvalidState(_))));

        let lenient = ReversalEngine::new(store, LedgerPolicy::default().allowing_reversal_of_reversal(true));
        assert!(lenient.check_reversible(&entry).is_ok());
    }

    #[test]
    fn test_draft_and_closed_not_reversible() {
        let store: Arc<dyn LedgerStore> = Arc::new(crate::adapters::InMemoryLedgerStore::new());
        let engine = ReversalEngine::new(store, LedgerPolicy::default());

        let mut draft = posted_entry();
        draft.status = EntryStatus::Draft;
        assert!(engine.check_reversible(&draft).is_err());

        let mut closed = posted_entry();
        closed.reversal_entry_id = Some(JournalEntryId::new());
        let err = engine.check_reversible(&closed).unwrap_err();
        assert!(err.to_string().contains("already been reversed"));
    }

    #[test]
    fn test_default_reversal_date_never_precedes_original() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();

        assert_eq!(reversal_entry_date(None, d(9, 30), d(6, 1)).unwrap(), d(9, 30));
        assert_eq!(reversal_entry_date(None, d(3, 1), d(6, 1)).unwrap(), d(6, 1));
        assert_eq!(reversal_entry_date(Some(d(4, 2)), d(3, 1), d(6, 1)).unwrap(), d(4, 2));

        let err = reversal_entry_date(Some(d(2, 1)), d(3, 1), d(6, 1)).unwrap_err();
        assert_eq!(err.field_errors()[0].path, "reversal_date");
    }
}
