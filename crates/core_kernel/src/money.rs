//! Currency metadata and decimal helpers for monetary amounts
//!
//! Amounts throughout the ledger are plain `rust_decimal::Decimal` values.
//! Arithmetic is exact; rounding happens only when a figure leaves the
//! ledger in a report, using the currency's minor-unit precision.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Difference below which report totals are considered balanced
pub const REPORT_TOLERANCE: Decimal = dec!(0.01);

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    PKR,
    USD,
    EUR,
    GBP,
    AED,
    SAR,
    INR,
    JPY,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::PKR => "Rs",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::AED => "AED",
            Currency::SAR => "SAR",
            Currency::INR => "₹",
            Currency::JPY => "¥",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::PKR => "PKR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::AED => "AED",
            Currency::SAR => "SAR",
            Currency::INR => "INR",
            Currency::JPY => "JPY",
        }
    }

    /// Rounds an amount to this currency's minor units (half away from zero)
    pub fn round(&self, amount: Decimal) -> Decimal {
        round_to(amount, self.decimal_places())
    }

    /// Returns true if the amount needs no more precision than the currency allows
    pub fn fits_minor_units(&self, amount: Decimal) -> bool {
        fits_scale(amount, self.decimal_places())
    }

    /// Formats an amount with the currency symbol, rounded for display
    pub fn format(&self, amount: Decimal) -> String {
        let dp = self.decimal_places() as usize;
        format!("{} {:.dp$}", self.symbol(), self.round(amount), dp = dp)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PKR" => Ok(Currency::PKR),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "AED" => Ok(Currency::AED),
            "SAR" => Ok(Currency::SAR),
            "INR" => Ok(Currency::INR),
            "JPY" => Ok(Currency::JPY),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money handling
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// Rounds to `dp` places, midpoint away from zero
pub fn round_to(amount: Decimal, dp: u32) -> Decimal {
    amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns true if `amount` has no significant digits beyond `dp` places
pub fn fits_scale(amount: Decimal, dp: u32) -> bool {
    amount.normalize().scale() <= dp
}

/// Returns true if `a` and `b` differ by no more than `tolerance`
pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

/// Sums amounts, failing instead of panicking on overflow
pub fn checked_sum<I>(amounts: I) -> Result<Decimal, MoneyError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or(MoneyError::Overflow)
}
