//! Profit and loss statements

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::instrument;

use core_kernel::AccountId;

use super::{activity_by_account, AccountRef, DateRange, LedgerReports};
use crate::account::{Account, AccountType};
use crate::error::LedgerError;
use crate::ports::{AccountQuery, PostedLineQuery};

/// Period activity of one revenue or expense account, on its normal side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitLossLine {
    pub account: AccountRef,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitLoss {
    pub period: DateRange,
    pub revenue: Vec<ProfitLossLine>,
    pub expenses: Vec<ProfitLossLine>,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    /// Revenue minus expenses
    pub net_income: Decimal,
}

/// A current figure against its prior-period counterpart
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Variance {
    pub current: Decimal,
    pub prior: Decimal,
    pub change: Decimal,
    /// Percentage change; `None` when the prior figure is zero
    pub change_pct: Option<Decimal>,
}

impl Variance {
    pub fn between(current: Decimal, prior: Decimal) -> Self {
        let change = current - prior;
        let change_pct = (!prior.is_zero())
            .then(|| change.checked_div(prior.abs()))
            .flatten()
            .map(|ratio| (ratio * Decimal::ONE_HUNDRED).round_dp(2));
        Self { current, prior, change, change_pct }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VarianceLine {
    pub account: AccountRef,
    pub variance: Variance,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparativeProfitLoss {
    pub current: ProfitLoss,
    pub prior: ProfitLoss,
    /// Every account present in either period, revenue first
    pub lines: Vec<VarianceLine>,
    pub total_revenue: Variance,
    pub total_expenses: Variance,
    pub net_income: Variance,
}

impl LedgerReports {
    /// Revenue and expense activity within `period`
    #[instrument(skip(self))]
    pub async fn profit_loss(&self, period: DateRange) -> Result<ProfitLoss, LedgerError> {
        let accounts = self.income_statement_accounts().await?;
        let activity = activity_by_account(
            &self
                .store
                .posted_lines(PostedLineQuery::between(period.start, period.end))
                .await?,
        );

        let mut revenue = Vec::new();
        let mut expenses = Vec::new();
        let mut total_revenue = Decimal::ZERO;
        let mut total_expenses = Decimal::ZERO;
        for account in &accounts {
            let Some(moved) = activity.get(&account.id) else {
                continue;
            };
            let amount = moved.signed(account.normal_balance);
            if amount.is_zero() {
                continue;
            }
            let line = ProfitLossLine { account: AccountRef::from(account), amount: self.round(amount) };
            if account.account_type == AccountType::Revenue {
                total_revenue += amount;
                revenue.push(line);
            } else {
                total_expenses += amount;
                expenses.push(line);
            }
        }

        Ok(ProfitLoss {
            period,
            revenue,
            expenses,
            total_revenue: self.round(total_revenue),
            total_expenses: self.round(total_expenses),
            net_income: self.round(total_revenue - total_expenses),
        })
    }

    /// Profit and loss for `current` and `prior` with per-account and total variance
    #[instrument(skip(self))]
    pub async fn comparative_profit_loss(
        &self,
        current: DateRange,
        prior: DateRange,
    ) -> Result<ComparativeProfitLoss, LedgerError> {
        let current = self.profit_loss(current).await?;
        let prior = self.profit_loss(prior).await?;

        let amounts = |statement: &ProfitLoss| -> HashMap<AccountId, Decimal> {
            statement
                .revenue
                .iter()
                .chain(statement.expenses.iter())
                .map(|l| (l.account.account_id, l.amount))
                .collect()
        };
        let now = amounts(&current);
        let before = amounts(&prior);

        let mut refs: Vec<&AccountRef> = current
            .revenue
            .iter()
            .chain(current.expenses.iter())
            .chain(prior.revenue.iter())
            .chain(prior.expenses.iter())
            .map(|l| &l.account)
            .collect();
        refs.sort_by(|a, b| (a.account_type, &a.code).cmp(&(b.account_type, &b.code)));
        refs.dedup_by_key(|r| r.account_id);

        let lines = refs
            .into_iter()
            .map(|account| VarianceLine {
                account: account.clone(),
                variance: Variance::between(
                    now.get(&account.account_id).copied().unwrap_or_default(),
                    before.get(&account.account_id).copied().unwrap_or_default(),
                ),
            })
            .collect();

        Ok(ComparativeProfitLoss {
            lines,
            total_revenue: Variance::between(current.total_revenue, prior.total_revenue),
            total_expenses: Variance::between(current.total_expenses, prior.total_expenses),
            net_income: Variance::between(current.net_income, prior.net_income),
            current,
            prior,
        })
    }

    async fn income_statement_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let accounts = self
            .store
            .list_accounts(AccountQuery::non_header())
            .await?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.account_type.is_income_statement())
            .collect())
    }
}
