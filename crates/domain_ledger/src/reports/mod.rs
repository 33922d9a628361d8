//! Ledger and report derivation
//!
//! Read-only projections over posted lines and account state. Historical
//! figures are replayed from the journal; only [`LedgerReports::reconcile_balances`]
//! looks at the materialised `current_balance`. Accumulation is exact and
//! amounts are rounded to the currency's minor units only when a report is
//! assembled.

pub mod ledger;
pub mod period;
pub mod profit_loss;
pub mod trial_balance;

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use core_kernel::AccountId;
use crate::account::{Account, AccountType, NormalBalance};
use crate::policy::LedgerPolicy;
use crate::ports::{LedgerStore, PostedLine};

pub use ledger::{AccountLedger, LedgerSummary, LedgerSummaryRow, LedgerTransaction};
pub use period::DateRange;
pub use profit_loss::{ComparativeProfitLoss, ProfitLoss, ProfitLossLine, Variance, VarianceLine};
pub use trial_balance::{
    BalanceDiscrepancy, GroupedTrialBalance, TrialBalance, TrialBalanceGroup, TrialBalanceLine,
    TrialBalanceValidation, TrialBalanceWarning, WarningKind,
};

/// Account identity as shown on reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRef {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
}

impl From<&Account> for AccountRef {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            normal_balance: account.normal_balance,
        }
    }
}

/// Debit and credit totals for one account
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Activity {
    pub debit: Decimal,
    pub credit: Decimal,
}

impl Activity {
    /// Net change signed relative to `normal`
    pub fn signed(&self, normal: NormalBalance) -> Decimal {
        normal.signed_delta(self.debit, self.credit)
    }
}

/// Sums posted lines per account
pub(crate) fn activity_by_account(lines: &[PostedLine]) -> HashMap<AccountId, Activity> {
    let mut totals: HashMap<AccountId, Activity> = HashMap::new();
    for line in lines {
        let activity = totals.entry(line.account_id).or_default();
        activity.debit += line.debit;
        activity.credit += line.credit;
    }
    totals
}

/// Report queries over a ledger store
#[derive(Clone)]
pub struct LedgerReports {
    store: Arc<dyn LedgerStore>,
    policy: LedgerPolicy,
}

impl LedgerReports {
    pub fn new(store: Arc<dyn LedgerStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    fn round(&self, amount: Decimal) -> Decimal {
        self.policy.currency.round(amount)
    }
}
