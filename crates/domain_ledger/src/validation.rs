//! Journal entry validation
//!
//! Checks are collected rather than short-circuited so a caller sees every
//! offending field at once.

use rust_decimal::Decimal;

use core_kernel::money::{checked_sum, within_tolerance};
use crate::error::{FieldError, LedgerError};
use crate::journal::{JournalLine, NewJournalEntry, NewJournalLine};
use crate::policy::LedgerPolicy;

/// Minimum lines in a journal entry
pub const MIN_LINES: usize = 2;

/// Validates a create request before anything is persisted
pub fn validate_new_entry(entry: &NewJournalEntry, policy: &LedgerPolicy) -> Result<(), LedgerError> {
    let mut errors = Vec::new();
    if entry.description.trim().is_empty() {
        errors.push(FieldError::new("description", "must not be empty"));
    }
    errors.extend(line_errors(amounts(&entry.lines), policy));
    finish(errors)
}

/// Validates a replacement line set for a draft
pub fn validate_new_lines(lines: &[NewJournalLine], policy: &LedgerPolicy) -> Result<(), LedgerError> {
    finish(line_errors(amounts(lines), policy))
}

/// Re-validates stored lines, used again at posting time
pub fn validate_stored_lines(lines: &[JournalLine], policy: &LedgerPolicy) -> Result<(), LedgerError> {
    finish(line_errors(lines.iter().map(|l| (l.debit, l.credit)), policy))
}

fn amounts(lines: &[NewJournalLine]) -> impl Iterator<Item = (Decimal, Decimal)> + '_ {
    lines.iter().map(|l| (l.debit, l.credit))
}

fn finish(errors: Vec<FieldError>) -> Result<(), LedgerError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::validation(errors))
    }
}

fn line_errors<I>(lines: I, policy: &LedgerPolicy) -> Vec<FieldError>
where
    I: Iterator<Item = (Decimal, Decimal)>,
{
    let lines: Vec<(Decimal, Decimal)> = lines.collect();
    let mut errors = Vec::new();

    if lines.len() < MIN_LINES {
        errors.push(FieldError::new(
            "lines",
            format!("at least {} lines are required", MIN_LINES),
        ));
    }

    let places = policy.currency.decimal_places();
    let mut line_ok = true;
    for (index, (debit, credit)) in lines.iter().enumerate() {
        for (side, amount) in [("debit", debit), ("credit", credit)] {
            let path = format!("lines[{}].{}", index, side);
            if amount.is_sign_negative() && !amount.is_zero() {
                errors.push(FieldError::new(path, "must be non-negative"));
                line_ok = false;
            } else if !policy.currency.fits_minor_units(*amount) {
                errors.push(FieldError::new(path, format!("at most {} decimal places", places)));
                line_ok = false;
            }
        }
        match (debit.is_zero(), credit.is_zero()) {
            (true, true) => {
                errors.push(FieldError::new(
                    format!("lines[{}]", index),
                    "either debit or credit must be non-zero",
                ));
                line_ok = false;
            }
            (false, false) => {
                errors.push(FieldError::new(
                    format!("lines[{}]", index),
                    "a line cannot carry both a debit and a credit",
                ));
                line_ok = false;
            }
            _ => {}
        }
    }

    if line_ok && lines.len() >= MIN_LINES {
        let debits = checked_sum(lines.iter().map(|(d, _)| *d));
        let credits = checked_sum(lines.iter().map(|(_, c)| *c));
        match (debits, credits) {
            (Ok(debits), Ok(credits)) => {
                if !within_tolerance(debits, credits, policy.balance_tolerance) {
                    errors.push(FieldError::new(
                        "lines",
                        format!(
                            "entry is unbalanced: total debit {} does not equal total credit {}",
                            debits, credits
                        ),
                    ));
                }
            }
            _ => errors.push(FieldError::new("lines", "line totals overflow")),
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{AccountId, UserId};
    use rust_decimal_macros::dec;

    use crate::journal::EntryType;

    fn request() -> NewJournalEntry {
        NewJournalEntry::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            EntryType::Manual,
            "Owner investment",
            UserId::new(),
        )
    }

    fn paths(err: LedgerError) -> Vec<String> {
        err.field_errors().iter().map(|e| e.path.clone()).collect()
    }

    #[test]
    fn test_balanced_entry_passes() {
        let entry = request()
            .debit(AccountId::new(), dec!(1000))
            .credit(AccountId::new(), dec!(600))
            .credit(AccountId::new(), dec!(400));
        assert!(validate_new_entry(&entry, &LedgerPolicy::default()).is_ok());
    }

    #[test]
    fn test_single_line_rejected() {
        let entry = request().debit(AccountId::new(), dec!(100));
        let err = validate_new_entry(&entry, &LedgerPolicy::default()).unwrap_err();
        assert_eq!(paths(err), vec!["lines"]);
    }

    #[test]
    fn test_unbalanced_rejected() {
        let entry = request()
            .debit(AccountId::new(), dec!(100))
            .credit(AccountId::new(), dec!(99.99));
        let err = validate_new_entry(&entry, &LedgerPolicy::default()).unwrap_err();
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn test_tolerance_allows_small_difference() {
        let entry = request()
            .debit(AccountId::new(), dec!(100))
            .credit(AccountId::new(), dec!(99.99));
        let policy = LedgerPolicy::default().with_balance_tolerance(dec!(0.01));
        assert!(validate_new_entry(&entry, &policy).is_ok());
    }

    #[test]
    fn test_per_line_detail() {
        let entry = request()
            .line(NewJournalLine {
                account_id: AccountId::new(),
                debit: dec!(-5),
                credit: dec!(0),
                description: None,
            })
            .debit(AccountId::new(), dec!(10.001))
            .line(NewJournalLine {
                account_id: AccountId::new(),
                debit: dec!(0),
                credit: dec!(0),
                description: None,
            });
        let err = validate_new_entry(&entry, &LedgerPolicy::default()).unwrap_err();
        let paths = paths(err);
        assert!(paths.contains(&"lines[0].debit".to_string()));
        assert!(paths.contains(&"lines[1].debit".to_string()));
        assert!(paths.contains(&"lines[2]".to_string()));
    }

    #[test]
    fn test_both_sides_rejected() {
        let entry = request()
            .line(NewJournalLine {
                account_id: AccountId::new(),
                debit: dec!(5),
                credit: dec!(5),
                description: None,
            })
            .debit(AccountId::new(), dec!(5))
            .credit(AccountId::new(), dec!(5));
        let err = validate_new_entry(&entry, &LedgerPolicy::default()).unwrap_err();
        assert_eq!(paths(err), vec!["lines[0]"]);
    }

    #[test]
    fn test_blank_description_rejected() {
        let mut entry = request()
            .debit(AccountId::new(), dec!(5))
            .credit(AccountId::new(), dec!(5));
        entry.description = "   ".into();
        let err = validate_new_entry(&entry, &LedgerPolicy::default()).unwrap_err();
        assert_eq!(paths(err), vec!["description"]);
    }

    #[test]
    fn test_trailing_zeros_within_scale() {
        let entry = request()
            .debit(AccountId::new(), dec!(10.5000))
            .credit(AccountId::new(), dec!(10.50));
        assert!(validate_new_entry(&entry, &LedgerPolicy::default()).is_ok());
    }
}
