//! Chart of accounts
//!
//! Accounts carry a materialised `current_balance` signed relative to their
//! normal balance: a positive figure sits on the account's normal side.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use core_kernel::{AccountId, UserId};
use crate::error::{FieldError, LedgerError};

/// Types of accounts in the chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Asset accounts (debit normal balance)
    Asset,
    /// Liability accounts (credit normal balance)
    Liability,
    /// Equity accounts (credit normal balance)
    Equity,
    /// Revenue accounts (credit normal balance)
    Revenue,
    /// Expense accounts (debit normal balance)
    Expense,
}

impl AccountType {
    /// All types in statement order
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    /// The polarity this type of account must carry
    pub fn normal_balance(&self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::Expense => NormalBalance::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalBalance::Credit
            }
        }
    }

    /// Returns true if this account type has a debit normal balance
    pub fn is_debit_normal(&self) -> bool {
        self.normal_balance() == NormalBalance::Debit
    }

    /// Revenue and expense accounts feed the profit and loss statement
    pub fn is_income_statement(&self) -> bool {
        matches!(self, AccountType::Revenue | AccountType::Expense)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LedgerError::field("account_type", format!("unknown account type '{}'", s)))
    }
}

/// Debit or credit polarity of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalBalance {
    Debit,
    Credit,
}

impl NormalBalance {
    /// Change in a balance signed relative to this polarity when a line
    /// debits `debit` and credits `credit`
    pub fn signed_delta(&self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            NormalBalance::Debit => debit - credit,
            NormalBalance::Credit => credit - debit,
        }
    }

    pub fn is_debit(&self) -> bool {
        *self == NormalBalance::Debit
    }

    pub fn opposite(&self) -> Self {
        match self {
            NormalBalance::Debit => NormalBalance::Credit,
            NormalBalance::Credit => NormalBalance::Debit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NormalBalance::Debit => "debit",
            NormalBalance::Credit => "credit",
        }
    }
}

impl FromStr for NormalBalance {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debit" => Ok(NormalBalance::Debit),
            "credit" => Ok(NormalBalance::Credit),
            other => Err(LedgerError::field(
                "normal_balance",
                format!("unknown normal balance '{}'", other),
            )),
        }
    }
}

/// Lifecycle of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(LedgerError::field("status", format!("unknown status '{}'", other))),
        }
    }
}

/// An account in the chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Account code (e.g., "1000")
    pub code: String,
    /// Account name
    pub name: String,
    /// Account type
    pub account_type: AccountType,
    /// Polarity, always consistent with `account_type`
    pub normal_balance: NormalBalance,
    /// Aggregation node; never posted to directly
    pub is_header: bool,
    /// Balance the account was opened with
    pub opening_balance: Decimal,
    /// Opening balance plus every posted line, signed relative to `normal_balance`
    pub current_balance: Decimal,
    /// Parent account ID (for hierarchical charts)
    pub parent_id: Option<AccountId>,
    /// Lifecycle state
    pub status: AccountStatus,
    /// Description
    pub description: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Fails unless journal lines may target this account
    pub fn ensure_postable(&self) -> Result<(), LedgerError> {
        if self.is_header {
            return Err(LedgerError::account(format!(
                "cannot post to header account {} ({})",
                self.code, self.name
            )));
        }
        if !self.is_active() {
            return Err(LedgerError::account(format!(
                "cannot post to inactive account {} ({})",
                self.code, self.name
            )));
        }
        Ok(())
    }

    /// Balance change from a line against this account
    pub fn signed_delta(&self, debit: Decimal, credit: Decimal) -> Decimal {
        self.normal_balance.signed_delta(debit, credit)
    }
}

/// Request for creating an account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, max = 20, message = "must be between 1 and 20 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 150, message = "must be between 1 and 150 characters"))]
    pub name: String,
    pub account_type: AccountType,
    /// Optional; must agree with `account_type` when given
    #[serde(default)]
    pub normal_balance: Option<NormalBalance>,
    #[serde(default)]
    pub is_header: bool,
    #[serde(default)]
    pub opening_balance: Decimal,
    #[serde(default)]
    pub parent_id: Option<AccountId>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    #[serde(default)]
    pub description: Option<String>,
}

impl NewAccount {
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            normal_balance: None,
            is_header: false,
            opening_balance: Decimal::ZERO,
            parent_id: None,
            description: None,
        }
    }

    pub fn header(mut self) -> Self {
        self.is_header = true;
        self
    }

    pub fn with_opening_balance(mut self, amount: Decimal) -> Self {
        self.opening_balance = amount;
        self
    }

    pub fn with_parent(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_normal_balance(mut self, normal_balance: NormalBalance) -> Self {
        self.normal_balance = Some(normal_balance);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the request in isolation (no store lookups)
    pub fn check(&self) -> Result<(), LedgerError> {
        let mut errors = validator_errors(self.validate());

        if !self
            .code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            errors.push(FieldError::new("code", "must be alphanumeric ('-' and '.' allowed)"));
        }
        if let Some(normal) = self.normal_balance {
            if normal != self.account_type.normal_balance() {
                errors.push(FieldError::new(
                    "normal_balance",
                    format!(
                        "{} accounts have a {} normal balance",
                        self.account_type,
                        self.account_type.normal_balance().as_str()
                    ),
                ));
            }
        }
        if self.is_header && !self.opening_balance.is_zero() {
            errors.push(FieldError::new("opening_balance", "header accounts must open at zero"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::validation(errors))
        }
    }
}

/// Request for updating account details; balances are never edited here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccount {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    /// `Some(None)` detaches the account from its parent
    pub parent_id: Option<Option<AccountId>>,
}

/// A node in the account hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct AccountNode {
    pub account: Account,
    pub children: Vec<AccountNode>,
}

/// One row of a chart-of-accounts template
#[derive(Debug, Clone, Copy)]
pub struct ChartTemplate {
    pub code: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
    pub is_header: bool,
    pub parent_code: Option<&'static str>,
}

const fn header(code: &'static str, name: &'static str, account_type: AccountType) -> ChartTemplate {
    ChartTemplate { code, name, account_type, is_header: true, parent_code: None }
}

const fn leaf(
    code: &'static str,
    name: &'static str,
    account_type: AccountType,
    parent: &'static str,
) -> ChartTemplate {
    ChartTemplate { code, name, account_type, is_header: false, parent_code: Some(parent) }
}

/// Standard chart of accounts for a trading business
pub struct StandardChartOfAccounts;

impl StandardChartOfAccounts {
    /// Templates ordered so every parent precedes its children
    pub fn templates() -> &'static [ChartTemplate] {
        use AccountType::*;
        const CHART: &[ChartTemplate] = &[
            header("1000", "Assets", Asset),
            leaf("1100", "Cash in Hand", Asset, "1000"),
            leaf("1200", "Bank Accounts", Asset, "1000"),
            leaf("1300", "Accounts Receivable", Asset, "1000"),
            leaf("1400", "Inventory", Asset, "1000"),
            leaf("1500", "Input Sales Tax", Asset, "1000"),
            header("2000", "Liabilities", Liability),
            leaf("2100", "Accounts Payable", Liability, "2000"),
            leaf("2200", "Salaries Payable", Liability, "2000"),
            leaf("2300", "Output Sales Tax", Liability, "2000"),
            header("3000", "Equity", Equity),
            leaf("3100", "Owner's Capital", Equity, "3000"),
            leaf("3200", "Retained Earnings", Equity, "3000"),
            header("4000", "Revenue", Revenue),
            leaf("4100", "Sales Revenue", Revenue, "4000"),
            leaf("4200", "Other Income", Revenue, "4000"),
            header("5000", "Expenses", Expense),
            leaf("5100", "Cost of Goods Sold", Expense, "5000"),
            leaf("5200", "Salaries Expense", Expense, "5000"),
            leaf("5300", "Rent Expense", Expense, "5000"),
            leaf("5400", "Utilities Expense", Expense, "5000"),
        ];
        CHART
    }
}

/// Flattens `validator` output into sorted field errors
pub(crate) fn validator_errors(result: Result<(), validator::ValidationErrors>) -> Vec<FieldError> {
    let Err(errors) = result else {
        return Vec::new();
    };
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                FieldError::new(field.clone(), message)
            })
        })
        .collect();
    fields.sort_by(|a, b| a.path.cmp(&b.path));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normal_balance_by_type() {
        assert_eq!(AccountType::Asset.normal_balance(), NormalBalance::Debit);
        assert_eq!(AccountType::Expense.normal_balance(), NormalBalance::Debit);
        assert_eq!(AccountType::Liability.normal_balance(), NormalBalance::Credit);
        assert_eq!(AccountType::Equity.normal_balance(), NormalBalance::Credit);
        assert_eq!(AccountType::Revenue.normal_balance(), NormalBalance::Credit);
    }

    #[test]
    fn test_signed_delta() {
        assert_eq!(NormalBalance::Debit.signed_delta(dec!(500), dec!(0)), dec!(500));
        assert_eq!(NormalBalance::Debit.signed_delta(dec!(0), dec!(200)), dec!(-200));
        assert_eq!(NormalBalance::Credit.signed_delta(dec!(0), dec!(500)), dec!(500));
        assert_eq!(NormalBalance::Credit.signed_delta(dec!(75), dec!(0)), dec!(-75));
    }

    #[test]
    fn test_new_account_inconsistent_normal_balance() {
        let err = NewAccount::new("4100", "Sales", AccountType::Revenue)
            .with_normal_balance(NormalBalance::Debit)
            .check()
            .unwrap_err();
        assert_eq!(err.field_errors()[0].path, "normal_balance");
    }

    #[test]
    fn test_header_must_open_at_zero() {
        let err = NewAccount::new("1000", "Assets", AccountType::Asset)
            .header()
            .with_opening_balance(dec!(10))
            .check()
            .unwrap_err();
        assert!(err.field_errors().iter().any(|e| e.path == "opening_balance"));
    }

    #[test]
    fn test_code_rules() {
        assert!(NewAccount::new("1100-01", "Petty Cash", AccountType::Asset).check().is_ok());

        let err = NewAccount::new("", "Nameless", AccountType::Asset).check().unwrap_err();
        assert!(err.field_errors().iter().any(|e| e.path == "code"));

        let err = NewAccount::new("11 00", "Spaced", AccountType::Asset).check().unwrap_err();
        assert!(err.field_errors().iter().any(|e| e.path == "code"));
    }

    #[test]
    fn test_standard_chart_parents_precede_children() {
        let templates = StandardChartOfAccounts::templates();
        for (index, template) in templates.iter().enumerate() {
            if let Some(parent) = template.parent_code {
                let parent_index = templates.iter().position(|t| t.code == parent).unwrap();
                assert!(parent_index < index, "{} listed before its parent", template.code);
                assert!(templates[parent_index].is_header);
                assert_eq!(templates[parent_index].account_type, template.account_type);
            }
        }
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("Revenue".parse::<AccountType>().unwrap(), AccountType::Revenue);
        assert!("income".parse::<AccountType>().is_err());
    }
}
