//! Tunable ledger rules

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::Currency;

/// Rules the ledger services apply when validating and posting entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// Reporting currency; its minor units bound line amount precision
    pub currency: Currency,
    /// Largest permitted |total debit - total credit| for an entry
    pub balance_tolerance: Decimal,
    /// Whether an entry that is itself a reversal may be reversed again
    pub allow_reversal_of_reversal: bool,
    /// Prefix of generated entry numbers (`JE` -> `JE-000042`)
    pub entry_number_prefix: String,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            balance_tolerance: Decimal::ZERO,
            allow_reversal_of_reversal: false,
            entry_number_prefix: "JE".to_string(),
        }
    }
}

impl LedgerPolicy {
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_balance_tolerance(mut self, tolerance: Decimal) -> Self {
        self.balance_tolerance = tolerance.abs();
        self
    }

    pub fn allowing_reversal_of_reversal(mut self, allow: bool) -> Self {
        self.allow_reversal_of_reversal = allow;
        self
    }

    pub fn with_entry_number_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.entry_number_prefix = prefix.into();
        self
    }
}
