//! Test Data Builders
//!
//! Builders for account and journal entry requests with sensible defaults,
//! so tests only spell out the fields they care about.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{AccountId, UserId};
use domain_ledger::account::{AccountType, NewAccount, NormalBalance};
use domain_ledger::journal::{EntryType, NewJournalEntry, NewJournalLine};

use crate::fixtures::DateFixtures;

/// Builder for account creation requests
pub struct TestAccountBuilder {
    request: NewAccount,
}

impl TestAccountBuilder {
    /// A leaf account named after its code
    pub fn new(code: impl Into<String>, account_type: AccountType) -> Self {
        let code = code.into();
        let name = format!("Account {}", code);
        Self { request: NewAccount::new(code, name, account_type) }
    }

    pub fn asset(code: impl Into<String>) -> Self {
        Self::new(code, AccountType::Asset)
    }

    pub fn liability(code: impl Into<String>) -> Self {
        Self::new(code, AccountType::Liability)
    }

    pub fn revenue(code: impl Into<String>) -> Self {
        Self::new(code, AccountType::Revenue)
    }

    pub fn expense(code: impl Into<String>) -> Self {
        Self::new(code, AccountType::Expense)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.request.name = name.into();
        self
    }

    pub fn header(mut self) -> Self {
        self.request = self.request.header();
        self
    }

    pub fn under(mut self, parent_id: AccountId) -> Self {
        self.request = self.request.with_parent(parent_id);
        self
    }

    pub fn opening(mut self, amount: Decimal) -> Self {
        self.request = self.request.with_opening_balance(amount);
        self
    }

    pub fn normal(mut self, normal_balance: NormalBalance) -> Self {
        self.request = self.request.with_normal_balance(normal_balance);
        self
    }

    pub fn build(self) -> NewAccount {
        self.request
    }
}

/// Builder for journal entry requests
pub struct TestEntryBuilder {
    entry_date: NaiveDate,
    entry_type: EntryType,
    description: String,
    reference_no: Option<String>,
    lines: Vec<NewJournalLine>,
    created_by: UserId,
}

impl TestEntryBuilder {
    /// A manual entry dated mid-year with no lines
    pub fn new(created_by: UserId) -> Self {
        Self {
            entry_date: DateFixtures::mid_year(),
            entry_type: EntryType::Manual,
            description: "Test entry".to_string(),
            reference_no: None,
            lines: Vec::new(),
            created_by,
        }
    }

    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.entry_date = date;
        self
    }

    pub fn of_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn reference(mut self, reference_no: impl Into<String>) -> Self {
        self.reference_no = Some(reference_no.into());
        self
    }

    pub fn debit(mut self, account_id: AccountId, amount: Decimal) -> Self {
        self.lines.push(NewJournalLine::debit(account_id, amount));
        self
    }

    pub fn credit(mut self, account_id: AccountId, amount: Decimal) -> Self {
        self.lines.push(NewJournalLine::credit(account_id, amount));
        self
    }

    /// Debits `debit_account` and credits `credit_account` with the same amount
    pub fn transfer(self, debit_account: AccountId, credit_account: AccountId, amount: Decimal) -> Self {
        self.debit(debit_account, amount).credit(credit_account, amount)
    }

    pub fn line(mut self, line: NewJournalLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn build(self) -> NewJournalEntry {
        let mut entry =
            NewJournalEntry::new(self.entry_date, self.entry_type, self.description, self.created_by);
        if let Some(reference_no) = self.reference_no {
            entry = entry.with_reference(reference_no);
        }
        self.lines.into_iter().fold(entry, NewJournalEntry::line)
    }
}
