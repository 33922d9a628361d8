//! Ledger service facade
//!
//! Wires the registry, the entry store, both engines and the reports over a
//! single store and policy. The outer layers talk to this type only.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use core_kernel::{AccountId, HealthCheckResult, JournalEntryId, UserId};

use crate::error::LedgerError;
use crate::entries::JournalEntryStore;
use crate::journal::{JournalEntry, NewJournalEntry};
use crate::policy::LedgerPolicy;
use crate::ports::LedgerStore;
use crate::posting::{PostingEngine, PostingResult};
use crate::registry::AccountRegistry;
use crate::reports::{
    AccountLedger, ComparativeProfitLoss, DateRange, GroupedTrialBalance, LedgerReports,
    LedgerSummary, ProfitLoss, TrialBalance, TrialBalanceValidation,
};
use crate::reversal::{ReversalEngine, ReversalResult};

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    policy: LedgerPolicy,
    accounts: AccountRegistry,
    entries: JournalEntryStore,
    posting: PostingEngine,
    reversal: ReversalEngine,
    reports: LedgerReports,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, policy: LedgerPolicy) -> Self {
        Self {
            accounts: AccountRegistry::new(store.clone()),
            entries: JournalEntryStore::new(store.clone(), policy.clone()),
            posting: PostingEngine::new(store.clone(), policy.clone()),
            reversal: ReversalEngine::new(store.clone(), policy.clone()),
            reports: LedgerReports::new(store.clone(), policy.clone()),
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    pub fn entries(&self) -> &JournalEntryStore {
        &self.entries
    }

    pub fn reports(&self) -> &LedgerReports {
        &self.reports
    }

    pub async fn health_check(&self) -> HealthCheckResult {
        self.store.health_check().await
    }

    /// Creates a draft entry
    pub async fn create_entry(&self, request: NewJournalEntry) -> Result<JournalEntry, LedgerError> {
        self.entries.create(request).await
    }

    pub async fn post_entry(
        &self,
        entry_id: JournalEntryId,
        posted_by: UserId,
    ) -> Result<PostingResult, LedgerError> {
        self.posting.post(entry_id, posted_by).await
    }

    /// Posts only if the draft is still at `expected_version`
    pub async fn post_entry_at_version(
        &self,
        entry_id: JournalEntryId,
        posted_by: UserId,
        expected_version: i64,
    ) -> Result<PostingResult, LedgerError> {
        self.posting
            .post_expecting(entry_id, posted_by, Some(expected_version))
            .await
    }

    /// Creates and posts a draft in two steps; the draft survives if posting fails
    pub async fn create_and_post(
        &self,
        request: NewJournalEntry,
    ) -> Result<PostingResult, LedgerError> {
        let posted_by = request.created_by;
        let entry = self.entries.create(request).await?;
        self.posting.post(entry.id, posted_by).await
    }

    pub async fn reverse_entry(
        &self,
        entry_id: JournalEntryId,
        created_by: UserId,
        reversal_date: Option<NaiveDate>,
    ) -> Result<ReversalResult, LedgerError> {
        self.reversal.reverse(entry_id, created_by, reversal_date).await
    }

    /// Account ledger; missing bounds default to calendar year to date
    pub async fn account_ledger(
        &self,
        account_id: AccountId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<AccountLedger, LedgerError> {
        let period = DateRange::or_year_to_date(start, end, today())?;
        self.reports.account_ledger(account_id, period).await
    }

    pub async fn ledger_summary(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        show_zero_balances: bool,
    ) -> Result<LedgerSummary, LedgerError> {
        let period = DateRange::or_year_to_date(start, end, today())?;
        self.reports.ledger_summary(period, show_zero_balances).await
    }

    /// Trial balance as of `as_of`, today when `None`
    pub async fn trial_balance(&self, as_of: Option<NaiveDate>) -> Result<TrialBalance, LedgerError> {
        self.reports.trial_balance(as_of.unwrap_or_else(today)).await
    }

    pub async fn grouped_trial_balance(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<GroupedTrialBalance, LedgerError> {
        self.reports.grouped_trial_balance(as_of.unwrap_or_else(today)).await
    }

    pub async fn validate_trial_balance(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<TrialBalanceValidation, LedgerError> {
        self.reports.validate_trial_balance(as_of.unwrap_or_else(today)).await
    }

    pub async fn profit_loss(&self, period: DateRange) -> Result<ProfitLoss, LedgerError> {
        self.reports.profit_loss(period).await
    }

    /// Comparative statement; the prior period defaults to the one preceding `period`
    pub async fn comparative_profit_loss(
        &self,
        period: DateRange,
        prior: Option<DateRange>,
    ) -> Result<ComparativeProfitLoss, LedgerError> {
        let prior = match prior {
            Some(prior) => prior,
            None => period.preceding()?,
        };
        self.reports.comparative_profit_loss(period, prior).await
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
