//! Property-Based Test Generators
//!
//! Proptest strategies for amounts, dates and entries that keep ledger
//! invariants: two decimal places, positive line amounts, balanced sides.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::AccountId;
use domain_ledger::journal::{EntryType, NewJournalLine};

use crate::fixtures::DateFixtures;

/// Strategy for positive amounts from 0.01 to 10,000.00
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for any entry type
pub fn entry_type_strategy() -> impl Strategy<Value = EntryType> {
    prop::sample::select(EntryType::ALL.to_vec())
}

/// Strategy for dates within the 2024 fiscal year
pub fn fiscal_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u32..366).prop_map(DateFixtures::day_of_year)
}

/// Strategy for the lines of a balanced entry over `accounts`
///
/// One to four debit lines are offset by a single credit line for their
/// total, so debits always equal credits exactly.
pub fn balanced_lines_strategy(accounts: Vec<AccountId>) -> impl Strategy<Value = Vec<NewJournalLine>> {
    let debit_accounts = prop::sample::select(accounts.clone());
    let credit_account = prop::sample::select(accounts);
    (prop::collection::vec((debit_accounts, amount_strategy()), 1..5), credit_account).prop_map(
        |(debits, credit_account)| {
            let total: Decimal = debits.iter().map(|(_, amount)| *amount).sum();
            debits
                .into_iter()
                .map(|(account_id, amount)| NewJournalLine::debit(account_id, amount))
                .chain(std::iter::once(NewJournalLine::credit(credit_account, total)))
                .collect()
        },
    )
}
