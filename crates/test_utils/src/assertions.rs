//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that print the figures involved on
//! failure.

use rust_decimal::Decimal;

use domain_ledger::reports::TrialBalance;
use domain_ledger::{ErrorKind, JournalEntry, LedgerError};

/// Asserts two amounts are numerically equal, ignoring scale
///
/// # Panics
///
/// Panics if the amounts differ
pub fn assert_amount_eq(actual: Decimal, expected: Decimal) {
    assert!(
        actual == expected,
        "Amounts differ: actual={}, expected={}, diff={}",
        actual,
        expected,
        actual - expected
    );
}

/// Asserts an entry's debits equal its credits
pub fn assert_entry_balanced(entry: &JournalEntry) {
    assert_eq!(
        entry.total_debit(),
        entry.total_credit(),
        "Entry {} is unbalanced: debit={}, credit={}",
        entry.entry_number,
        entry.total_debit(),
        entry.total_credit()
    );
}

/// Asserts the trial balance totals agree and the report says so
pub fn assert_trial_balance_balanced(trial: &TrialBalance) {
    assert!(
        trial.is_balanced,
        "Trial balance as of {} is out by {}: debit={}, credit={}",
        trial.as_of,
        trial.difference,
        trial.total_debit,
        trial.total_credit
    );
    assert_amount_eq(trial.total_debit, trial.total_credit);
}

/// Asserts `result` failed with `kind`
pub fn assert_error_kind<T: std::fmt::Debug>(result: &Result<T, LedgerError>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {} error, got Ok({:?})", kind, value),
        Err(err) => assert_eq!(err.kind(), kind, "Unexpected error: {}", err),
    }
}

/// Asserts `err` is a validation failure naming `path`
pub fn assert_field_error(err: &LedgerError, path: &str) {
    assert_eq!(err.kind(), ErrorKind::ValidationError, "Not a validation error: {}", err);
    assert!(
        err.field_errors().iter().any(|f| f.path == path),
        "No field error at {}; got {:?}",
        path,
        err.field_errors()
    );
}
