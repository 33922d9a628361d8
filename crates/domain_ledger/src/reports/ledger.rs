//! Account ledgers and the ledger summary

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};

use core_kernel::{AccountId, JournalEntryId};

use super::{activity_by_account, AccountRef, DateRange, LedgerReports};
use crate::error::LedgerError;
use crate::journal::EntryType;
use crate::ports::{AccountQuery, PostedLineQuery};

/// One posted line on an account ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerTransaction {
    pub entry_id: JournalEntryId,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub entry_type: EntryType,
    pub description: String,
    pub reference_no: Option<String>,
    pub debit: Decimal,
    pub credit: Decimal,
    /// Balance after this line, signed relative to the account's normal balance
    pub running_balance: Decimal,
}

/// Activity of one account over a period
#[derive(Debug, Clone, Serialize)]
pub struct AccountLedger {
    pub account: AccountRef,
    pub period: DateRange,
    /// Balance at the start of `period.start`
    pub opening_balance: Decimal,
    pub transactions: Vec<LedgerTransaction>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub closing_balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummaryRow {
    pub account: AccountRef,
    pub opening_balance: Decimal,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub closing_balance: Decimal,
}

impl LedgerSummaryRow {
    fn is_zero(&self) -> bool {
        self.opening_balance.is_zero()
            && self.total_debit.is_zero()
            && self.total_credit.is_zero()
            && self.closing_balance.is_zero()
    }
}

/// Per-account activity for every non-header account
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub period: DateRange,
    pub rows: Vec<LedgerSummaryRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

impl LedgerReports {
    /// Ledger of one account over `period`
    ///
    /// The opening balance is the account's opening balance plus every posted
    /// line dated before the period. Lines are ordered by entry date, then
    /// entry number.
    #[instrument(skip(self))]
    pub async fn account_ledger(
        &self,
        account_id: AccountId,
        period: DateRange,
    ) -> Result<AccountLedger, LedgerError> {
        let account = self
            .store
            .get_account(account_id)
            .await
            .map_err(LedgerError::from_port("Account"))?;

        let before = self
            .store
            .posted_lines(PostedLineQuery::for_account(account_id).before(period.start))
            .await?;
        let prior = activity_by_account(&before)
            .remove(&account_id)
            .unwrap_or_default();
        let opening_balance = account.opening_balance + prior.signed(account.normal_balance);

        let within = self
            .store
            .posted_lines(PostedLineQuery {
                from: Some(period.start),
                to: Some(period.end),
                ..PostedLineQuery::for_account(account_id)
            })
            .await?;
        debug!(account = %account.code, lines = within.len(), "account ledger lines loaded");

        let mut running = opening_balance;
        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;
        let mut transactions = Vec::with_capacity(within.len());
        for line in within {
            running += account.signed_delta(line.debit, line.credit);
            total_debit += line.debit;
            total_credit += line.credit;
            transactions.push(LedgerTransaction {
                entry_id: line.entry_id,
                entry_number: line.entry_number,
                entry_date: line.entry_date,
                entry_type: line.entry_type,
                description: line.description.unwrap_or(line.entry_description),
                reference_no: line.reference_no,
                debit: self.round(line.debit),
                credit: self.round(line.credit),
                running_balance: self.round(running),
            });
        }

        Ok(AccountLedger {
            account: AccountRef::from(&account),
            period,
            opening_balance: self.round(opening_balance),
            transactions,
            total_debit: self.round(total_debit),
            total_credit: self.round(total_credit),
            closing_balance: self.round(running),
        })
    }

    /// Opening, activity and closing balance of every non-header account
    ///
    /// With `show_zero_balances` false, rows with no balance and no activity
    /// are left out.
    #[instrument(skip(self))]
    pub async fn ledger_summary(
        &self,
        period: DateRange,
        show_zero_balances: bool,
    ) -> Result<LedgerSummary, LedgerError> {
        let accounts = self
            .store
            .list_accounts(AccountQuery::non_header())
            .await?;
        let before = activity_by_account(
            &self
                .store
                .posted_lines(PostedLineQuery::default().before(period.start))
                .await?,
        );
        let within = activity_by_account(
            &self
                .store
                .posted_lines(PostedLineQuery::between(period.start, period.end))
                .await?,
        );

        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;
        let mut rows = Vec::new();
        for account in &accounts {
            let prior = before.get(&account.id).copied().unwrap_or_default();
            let activity = within.get(&account.id).copied().unwrap_or_default();
            let opening = account.opening_balance + prior.signed(account.normal_balance);
            let closing = opening + activity.signed(account.normal_balance);

            let row = LedgerSummaryRow {
                account: AccountRef::from(account),
                opening_balance: self.round(opening),
                total_debit: self.round(activity.debit),
                total_credit: self.round(activity.credit),
                closing_balance: self.round(closing),
            };
            if !show_zero_balances && row.is_zero() {
                continue;
            }
            total_debit += activity.debit;
            total_credit += activity.credit;
            rows.push(row);
        }

        Ok(LedgerSummary {
            period,
            rows,
            total_debit: self.round(total_debit),
            total_credit: self.round(total_credit),
        })
    }
}
