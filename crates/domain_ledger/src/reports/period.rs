//! Reporting periods

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// An inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Fails when `start` is after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, LedgerError> {
        if start > end {
            return Err(LedgerError::field(
                "start_date",
                format!("start date {} is after end date {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    /// 1 January of `today`'s year through `today`
    pub fn year_to_date(today: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        Self { start, end: today }
    }

    /// Builds a range from optional bounds, defaulting to year to date
    pub fn or_year_to_date(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, LedgerError> {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or_else(|| Self::year_to_date(end).start);
        Self::new(start, end)
    }

    /// Number of days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The range of equal length ending the day before this one starts
    ///
    /// Fails when that range would start before the earliest representable date.
    pub fn preceding(&self) -> Result<Self, LedgerError> {
        let no_prior = || {
            LedgerError::field("start_date", format!("no period of equal length precedes {}", self.start))
        };
        let end = self.start.pred_opt().ok_or_else(no_prior)?;
        let start = end
            .checked_sub_signed(chrono::Duration::days(self.days() - 1))
            .ok_or_else(no_prior)?;
        Ok(Self { start, end })
    }
}
