//! Pre-built Test Fixtures
//!
//! Seeded books over any store, plus fixed dates and amounts so tests read
//! the same way across crates.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

use core_kernel::{AccountId, UserId};
use domain_ledger::{InMemoryLedgerStore, LedgerPolicy, LedgerService, LedgerStore};

/// Fixed dates within the 2024 fiscal year
pub struct DateFixtures;

impl DateFixtures {
    pub fn year_start() -> NaiveDate {
        date(2024, 1, 1)
    }

    pub fn mid_year() -> NaiveDate {
        date(2024, 6, 30)
    }

    pub fn year_end() -> NaiveDate {
        date(2024, 12, 31)
    }

    /// A date inside the 2024 fiscal year, `day` days after January 1st
    pub fn day_of_year(day: u32) -> NaiveDate {
        Self::year_start() + chrono::Days::new(u64::from(day))
    }
}

/// Amounts used by the worked examples
pub struct AmountFixtures;

impl AmountFixtures {
    pub fn cash_sale() -> Decimal {
        dec!(10000.00)
    }

    pub fn rent() -> Decimal {
        dec!(2500.00)
    }

    pub fn owner_investment() -> Decimal {
        dec!(50000.00)
    }
}

/// Standard chart codes
pub mod codes {
    pub const CASH: &str = "1100";
    pub const BANK: &str = "1200";
    pub const RECEIVABLES: &str = "1300";
    pub const PAYABLES: &str = "2100";
    pub const CAPITAL: &str = "3100";
    pub const SALES: &str = "4100";
    pub const RENT: &str = "5300";
    pub const ASSETS_HEADER: &str = "1000";
}

/// A ledger seeded with the standard chart of accounts
pub struct LedgerFixtures {
    pub ledger: LedgerService,
    pub user: UserId,
    accounts: HashMap<String, AccountId>,
}

impl LedgerFixtures {
    /// Seeds the standard chart into `store`, keeping accounts already there
    ///
    /// # Panics
    ///
    /// Panics if seeding fails
    pub async fn seeded(store: Arc<dyn LedgerStore>) -> Self {
        let ledger = LedgerService::new(store, LedgerPolicy::default());
        let user = UserId::new();
        ledger
            .accounts()
            .seed_standard_chart(user)
            .await
            .expect("seeding the standard chart should succeed");
        let accounts = ledger
            .accounts()
            .list_accounts(Default::default())
            .await
            .expect("listing the chart should succeed")
            .into_iter()
            .map(|a| (a.code, a.id))
            .collect();
        Self { ledger, user, accounts }
    }

    /// Standard chart over a fresh in-memory store
    pub async fn in_memory() -> Self {
        Self::seeded(Arc::new(InMemoryLedgerStore::new())).await
    }

    /// Id of the seeded account with `code`
    ///
    /// # Panics
    ///
    /// Panics if the code is not part of the standard chart
    pub fn account(&self, code: &str) -> AccountId {
        *self
            .accounts
            .get(code)
            .unwrap_or_else(|| panic!("account {} is not in the standard chart", code))
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("fixture dates are valid")
}
