//! Shared primitive types used across the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A stable, unique identifier for a client.
pub type ClientId = String;

/// A stable, unique identifier for a ledger transaction.
pub type TxnId = String;

/// An inclusive calendar-date window for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// The trailing `days`-day window ending at `end` (inclusive on both sides).
    pub fn last_days(end: NaiveDate, days: i64) -> Self {
        Self {
            from: end - chrono::Duration::days(days.max(1) - 1),
            to: end,
        }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        d >= self.from && d <= self.to
    }

    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }
}
