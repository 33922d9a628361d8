//! Trial balance, its grouped and validated forms, and balance reconciliation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};

use core_kernel::REPORT_TOLERANCE;

use super::{activity_by_account, AccountRef, LedgerReports};
use crate::account::{Account, AccountType};
use crate::error::LedgerError;
use crate::ports::{AccountQuery, PostedLineQuery};

/// One account on the trial balance; exactly one of `debit`/`credit` is non-zero
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalanceLine {
    pub account: AccountRef,
    pub debit: Decimal,
    pub credit: Decimal,
    /// Balance signed relative to the account's normal balance
    pub balance: Decimal,
    /// The balance sits opposite the account's normal side
    pub is_abnormal: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub lines: Vec<TrialBalanceLine>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub difference: Decimal,
    pub is_balanced: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialBalanceGroup {
    pub account_type: AccountType,
    pub lines: Vec<TrialBalanceLine>,
    pub subtotal_debit: Decimal,
    pub subtotal_credit: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupedTrialBalance {
    pub as_of: NaiveDate,
    /// One group per account type with at least one line, in statement order
    pub groups: Vec<TrialBalanceGroup>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub is_balanced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Balance opposite the account's normal side
    AbnormalBalance,
    /// Materialised balance disagrees with the journal
    BalanceDrift,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalanceWarning {
    pub kind: WarningKind,
    pub account_code: String,
    pub message: String,
}

/// A trial balance with anomalies flagged; warnings never block
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalanceValidation {
    pub trial_balance: TrialBalance,
    pub is_valid: bool,
    pub warnings: Vec<TrialBalanceWarning>,
}

/// An account whose `current_balance` differs from its replayed balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceDiscrepancy {
    pub account: AccountRef,
    pub recorded_balance: Decimal,
    pub replayed_balance: Decimal,
    pub difference: Decimal,
}

impl LedgerReports {
    /// Trial balance of every non-header account with a non-zero balance as
    /// of `as_of`
    ///
    /// Balances are replayed from posted lines dated on or before `as_of`.
    /// Accounts are chosen by replayed balance, not current status, so an
    /// account deactivated after `as_of` still appears.
    #[instrument(skip(self))]
    pub async fn trial_balance(&self, as_of: NaiveDate) -> Result<TrialBalance, LedgerError> {
        let accounts = self.store.list_accounts(AccountQuery::non_header()).await?;
        let activity =
            activity_by_account(&self.store.posted_lines(PostedLineQuery::up_to(as_of)).await?);

        let mut lines = Vec::new();
        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;
        for account in &accounts {
            let moved = activity.get(&account.id).copied().unwrap_or_default();
            let balance = account.opening_balance + moved.signed(account.normal_balance);
            if balance.is_zero() {
                continue;
            }
            if on_debit_side(account, balance) {
                total_debit += balance.abs();
            } else {
                total_credit += balance.abs();
            }
            lines.push(self.line_for(account, balance));
        }

        let difference = total_debit - total_credit;
        Ok(TrialBalance {
            as_of,
            lines,
            total_debit: self.round(total_debit),
            total_credit: self.round(total_credit),
            difference: self.round(difference),
            is_balanced: difference.abs() < REPORT_TOLERANCE,
        })
    }

    /// The trial balance grouped by account type with subtotals
    pub async fn grouped_trial_balance(
        &self,
        as_of: NaiveDate,
    ) -> Result<GroupedTrialBalance, LedgerError> {
        let trial = self.trial_balance(as_of).await?;

        let groups = AccountType::ALL
            .into_iter()
            .filter_map(|account_type| {
                let lines: Vec<TrialBalanceLine> = trial
                    .lines
                    .iter()
                    .filter(|l| l.account.account_type == account_type)
                    .cloned()
                    .collect();
                if lines.is_empty() {
                    return None;
                }
                let subtotal_debit = lines.iter().map(|l| l.debit).sum();
                let subtotal_credit = lines.iter().map(|l| l.credit).sum();
                Some(TrialBalanceGroup { account_type, lines, subtotal_debit, subtotal_credit })
            })
            .collect();

        Ok(GroupedTrialBalance {
            as_of,
            groups,
            total_debit: trial.total_debit,
            total_credit: trial.total_credit,
            is_balanced: trial.is_balanced,
        })
    }

    /// The trial balance plus warnings for abnormal balances and for
    /// accounts whose materialised balance has drifted from the journal
    #[instrument(skip(self))]
    pub async fn validate_trial_balance(
        &self,
        as_of: NaiveDate,
    ) -> Result<TrialBalanceValidation, LedgerError> {
        let trial_balance = self.trial_balance(as_of).await?;

        let mut warnings: Vec<TrialBalanceWarning> = trial_balance
            .lines
            .iter()
            .filter(|l| l.is_abnormal)
            .map(|l| TrialBalanceWarning {
                kind: WarningKind::AbnormalBalance,
                account_code: l.account.code.clone(),
                message: format!(
                    "{} ({}) has a {} balance of {} against its {} normal balance",
                    l.account.code,
                    l.account.name,
                    l.account.normal_balance.opposite().as_str(),
                    l.balance.abs(),
                    l.account.normal_balance.as_str()
                ),
            })
            .collect();

        for discrepancy in self.reconcile_balances().await? {
            warnings.push(TrialBalanceWarning {
                kind: WarningKind::BalanceDrift,
                account_code: discrepancy.account.code.clone(),
                message: format!(
                    "{} records {} but its posted lines give {}",
                    discrepancy.account.code,
                    discrepancy.recorded_balance,
                    discrepancy.replayed_balance
                ),
            });
        }

        for warning in &warnings {
            warn!(account = %warning.account_code, kind = ?warning.kind, "trial balance warning");
        }

        Ok(TrialBalanceValidation {
            is_valid: trial_balance.is_balanced,
            trial_balance,
            warnings,
        })
    }

    /// Accounts whose `current_balance` disagrees with opening balance plus
    /// every posted line
    #[instrument(skip(self))]
    pub async fn reconcile_balances(&self) -> Result<Vec<BalanceDiscrepancy>, LedgerError> {
        let accounts = self
            .store
            .list_accounts(AccountQuery::non_header())
            .await?;
        let activity =
            activity_by_account(&self.store.posted_lines(PostedLineQuery::default()).await?);

        let discrepancies: Vec<BalanceDiscrepancy> = accounts
            .iter()
            .filter_map(|account| {
                let moved = activity.get(&account.id).copied().unwrap_or_default();
                let replayed = account.opening_balance + moved.signed(account.normal_balance);
                let difference = account.current_balance - replayed;
                (!difference.is_zero()).then(|| BalanceDiscrepancy {
                    account: AccountRef::from(account),
                    recorded_balance: account.current_balance,
                    replayed_balance: replayed,
                    difference,
                })
            })
            .collect();

        if !discrepancies.is_empty() {
            warn!(accounts = discrepancies.len(), "materialised balances differ from the journal");
        }
        Ok(discrepancies)
    }

    fn line_for(&self, account: &Account, balance: Decimal) -> TrialBalanceLine {
        let is_abnormal = balance.is_sign_negative();
        let amount = self.round(balance.abs());
        let on_debit = on_debit_side(account, balance);
        TrialBalanceLine {
            account: AccountRef::from(account),
            debit: if on_debit { amount } else { Decimal::ZERO },
            credit: if on_debit { Decimal::ZERO } else { amount },
            balance: self.round(balance),
            is_abnormal,
        }
    }
}

/// Abnormal balances are shown on the side opposite the normal one
fn on_debit_side(account: &Account, balance: Decimal) -> bool {
    account.normal_balance.is_debit() != balance.is_sign_negative()
}
