//! Journal entries and their lines
//!
//! An entry starts as a [`EntryStatus::Draft`] and becomes
//! [`EntryStatus::Posted`] exactly once. A posted entry is closed once its
//! `reversal_entry_id` is set.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountId, JournalEntryId, JournalLineId, UserId};
use crate::error::LedgerError;

/// Business origin of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Sales,
    Purchase,
    Payment,
    Receipt,
    Adjustment,
    Payroll,
    Manual,
}

impl EntryType {
    pub const ALL: [EntryType; 7] = [
        EntryType::Sales,
        EntryType::Purchase,
        EntryType::Payment,
        EntryType::Receipt,
        EntryType::Adjustment,
        EntryType::Payroll,
        EntryType::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Sales => "sales",
            EntryType::Purchase => "purchase",
            EntryType::Payment => "payment",
            EntryType::Receipt => "receipt",
            EntryType::Adjustment => "adjustment",
            EntryType::Payroll => "payroll",
            EntryType::Manual => "manual",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LedgerError::field("entry_type", format!("unknown entry type '{}'", s)))
    }
}

/// Posting state of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    Posted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(EntryStatus::Draft),
            "posted" => Ok(EntryStatus::Posted),
            other => Err(LedgerError::field("status", format!("unknown entry status '{}'", other))),
        }
    }
}

/// A single debit or credit against one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: JournalLineId,
    /// 1-based position within the entry
    pub line_no: u32,
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
}

impl JournalLine {
    /// Debit minus credit
    pub fn net_debit(&self) -> Decimal {
        self.debit - self.credit
    }

    /// The same line with its sides swapped
    pub fn mirrored(&self, line_no: u32, description: Option<String>) -> Self {
        Self {
            id: JournalLineId::new(),
            line_no,
            account_id: self.account_id,
            debit: self.credit,
            credit: self.debit,
            description,
        }
    }
}

/// A journal entry with its ordered lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    /// Formatted sequential number, e.g. `JE-000042`
    pub entry_number: String,
    /// Allocation order of `entry_number`
    pub sequence: i64,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub description: String,
    pub reference_no: Option<String>,
    pub status: EntryStatus,
    pub lines: Vec<JournalLine>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub posted_by: Option<UserId>,
    pub posted_at: Option<DateTime<Utc>>,
    /// Set when this entry is itself a reversal; points at the entry it undoes
    pub reversed_entry_id: Option<JournalEntryId>,
    /// Set once this entry has been reversed; points at the reversal
    pub reversal_entry_id: Option<JournalEntryId>,
    /// Incremented on every change
    pub version: i64,
}

impl JournalEntry {
    pub fn is_posted(&self) -> bool {
        self.status == EntryStatus::Posted
    }

    pub fn is_draft(&self) -> bool {
        self.status == EntryStatus::Draft
    }

    /// Posted and already reversed
    pub fn is_closed(&self) -> bool {
        self.reversal_entry_id.is_some()
    }

    pub fn is_reversal(&self) -> bool {
        self.reversed_entry_id.is_some()
    }

    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Fails with InvalidState unless the entry is still a draft
    pub fn ensure_draft(&self, action: &str) -> Result<(), LedgerError> {
        if self.is_draft() {
            Ok(())
        } else {
            Err(LedgerError::invalid_state(format!(
                "cannot {} entry {}: it is already posted",
                action, self.entry_number
            )))
        }
    }
}

/// A line as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJournalLine {
    pub account_id: AccountId,
    #[serde(default)]
    pub debit: Decimal,
    #[serde(default)]
    pub credit: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewJournalLine {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self { account_id, debit: amount, credit: Decimal::ZERO, description: None }
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self { account_id, debit: Decimal::ZERO, credit: amount, description: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Request for creating a draft journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub description: String,
    #[serde(default)]
    pub reference_no: Option<String>,
    pub lines: Vec<NewJournalLine>,
    pub created_by: UserId,
}

impl NewJournalEntry {
    pub fn new(
        entry_date: NaiveDate,
        entry_type: EntryType,
        description: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        Self {
            entry_date,
            entry_type,
            description: description.into(),
            reference_no: None,
            lines: Vec::new(),
            created_by,
        }
    }

    pub fn with_reference(mut self, reference_no: impl Into<String>) -> Self {
        self.reference_no = Some(reference_no.into());
        self
    }

    /// Appends a debit line
    pub fn debit(mut self, account_id: AccountId, amount: Decimal) -> Self {
        self.lines.push(NewJournalLine::debit(account_id, amount));
        self
    }

    /// Appends a credit line
    pub fn credit(mut self, account_id: AccountId, amount: Decimal) -> Self {
        self.lines.push(NewJournalLine::credit(account_id, amount));
        self
    }

    pub fn line(mut self, line: NewJournalLine) -> Self {
        self.lines.push(line);
        self
    }
}

/// Changes to a draft entry; `None` leaves a field as is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJournalEntry {
    pub entry_date: Option<NaiveDate>,
    pub entry_type: Option<EntryType>,
    pub description: Option<String>,
    /// `Some(None)` clears the reference
    pub reference_no: Option<Option<String>>,
    /// Replaces all lines when present
    pub lines: Option<Vec<NewJournalLine>>,
    /// Rejects the update if the entry changed since this version was read
    pub expected_version: Option<i64>,
    pub updated_by: UserId,
}

impl UpdateJournalEntry {
    pub fn by(updated_by: UserId) -> Self {
        Self {
            entry_date: None,
            entry_type: None,
            description: None,
            reference_no: None,
            lines: None,
            expected_version: None,
            updated_by,
        }
    }
}

/// Filters for listing entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub entry_type: Option<EntryType>,
    pub status: Option<EntryStatus>,
    /// Entries with at least one line against this account
    pub account_id: Option<AccountId>,
    /// Case-insensitive match on entry number, description or reference
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl JournalQuery {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from: Some(from), to: Some(to), ..Default::default() }
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn for_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// In-process evaluation used by non-SQL stores
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        if self.from.is_some_and(|from| entry.entry_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.entry_date > to) {
            return false;
        }
        if self.entry_type.is_some_and(|t| entry.entry_type != t) {
            return false;
        }
        if self.status.is_some_and(|s| entry.status != s) {
            return false;
        }
        if let Some(account_id) = self.account_id {
            if !entry.lines.iter().any(|l| l.account_id == account_id) {
                return false;
            }
        }
        if let Some(text) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let hit = entry.entry_number.to_lowercase().contains(&needle)
                || entry.description.to_lowercase().contains(&needle)
                || entry
                    .reference_no
                    .as_deref()
                    .is_some_and(|r| r.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Everything a store needs to persist a new entry; the store assigns
/// `sequence` and `entry_number`
#[derive(Debug, Clone)]
pub struct NewEntryRecord {
    pub id: JournalEntryId,
    pub number_prefix: String,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub description: String,
    pub reference_no: Option<String>,
    pub status: EntryStatus,
    pub lines: Vec<JournalLine>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub posted_by: Option<UserId>,
    pub posted_at: Option<DateTime<Utc>>,
    pub reversed_entry_id: Option<JournalEntryId>,
}

impl NewEntryRecord {
    /// Materialises the stored entry once a number has been allocated
    pub fn into_entry(self, sequence: i64) -> JournalEntry {
        JournalEntry {
            id: self.id,
            entry_number: format_entry_number(&self.number_prefix, sequence),
            sequence,
            entry_date: self.entry_date,
            entry_type: self.entry_type,
            description: self.description,
            reference_no: self.reference_no,
            status: self.status,
            lines: self.lines,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.created_at,
            posted_by: self.posted_by,
            posted_at: self.posted_at,
            reversed_entry_id: self.reversed_entry_id,
            reversal_entry_id: None,
            version: 1,
        }
    }
}

/// Assigns ids and 1-based positions to caller-supplied lines
pub fn number_lines(lines: &[NewJournalLine]) -> Vec<JournalLine> {
    lines
        .iter()
        .zip(1u32..)
        .map(|(line, line_no)| JournalLine {
            id: JournalLineId::new(),
            line_no,
            account_id: line.account_id,
            debit: line.debit,
            credit: line.credit,
            description: line.description.clone(),
        })
        .collect()
}

/// `JE`, 42 -> `JE-000042`
pub fn format_entry_number(prefix: &str, sequence: i64) -> String {
    format!("{}-{:06}", prefix, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry() -> JournalEntry {
        let cash = AccountId::new();
        let sales = AccountId::new();
        let request = NewJournalEntry::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            EntryType::Sales,
            "Counter sale",
            UserId::new(),
        )
        .with_reference("INV-7")
        .debit(cash, dec!(500))
        .credit(sales, dec!(500));

        NewEntryRecord {
            id: JournalEntryId::new(),
            number_prefix: "JE".into(),
            entry_date: request.entry_date,
            entry_type: request.entry_type,
            description: request.description.clone(),
            reference_no: request.reference_no.clone(),
            status: EntryStatus::Draft,
            lines: number_lines(&request.lines),
            created_by: request.created_by,
            created_at: Utc::now(),
            posted_by: None,
            posted_at: None,
            reversed_entry_id: None,
        }
        .into_entry(42)
    }

    #[test]
    fn test_entry_number_format() {
        assert_eq!(format_entry_number("JE", 42), "JE-000042");
        assert_eq!(format_entry_number("GJ", 1_234_567), "GJ-1234567");
    }

    #[test]
    fn test_into_entry() {
        let entry = entry();
        assert_eq!(entry.entry_number, "JE-000042");
        assert_eq!(entry.version, 1);
        assert_eq!(entry.lines[0].line_no, 1);
        assert_eq!(entry.lines[1].line_no, 2);
        assert_eq!(entry.total_debit(), entry.total_credit());
        assert!(entry.is_draft());
        assert!(!entry.is_closed());
    }

    #[test]
    fn test_mirrored_line_swaps_sides() {
        let entry = entry();
        let mirrored = entry.lines[0].mirrored(1, None);
        assert_eq!(mirrored.debit, Decimal::ZERO);
        assert_eq!(mirrored.credit, dec!(500));
        assert_eq!(mirrored.account_id, entry.lines[0].account_id);
        assert_ne!(mirrored.id, entry.lines[0].id);
    }

    #[test]
    fn test_query_matching() {
        let entry = entry();
        let march = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(JournalQuery::between(march, march).matches(&entry));
        assert!(JournalQuery::default().search("inv-7").matches(&entry));
        assert!(JournalQuery::default().search("000042").matches(&entry));
        assert!(!JournalQuery::default().search("payroll").matches(&entry));
        assert!(!JournalQuery::default().with_status(EntryStatus::Posted).matches(&entry));
        assert!(JournalQuery::default()
            .for_account(entry.lines[1].account_id)
            .matches(&entry));
        assert!(!JournalQuery::default().with_type(EntryType::Payroll).matches(&entry));
    }

    #[test]
    fn test_posted_entry_is_not_draft() {
        let mut entry = entry();
        entry.status = EntryStatus::Posted;
        let err = entry.ensure_draft("edit").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }
}
