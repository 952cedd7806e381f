//! Calendar utilities for laying out a plan's date range.
//!
//! Pure and deterministic: day stepping is calendar-date arithmetic, so DST
//! transitions in any local timezone cannot produce a skipped or doubled day.

use chrono::{Datelike, Duration, NaiveDate};

/// A month bucket for grouping dates in the calendar view
///
/// `sort_key` (`YYYY-MM`) orders the buckets; `label` is display-only.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthGroup {
    pub sort_key: String,
    pub label: String,
}

/// Every calendar date from `start` to `end` inclusive
///
/// Returns an empty sequence when `start` is after `end`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        current += Duration::days(1);
    }
    days
}

/// The month bucket a date belongs to
pub fn month_group(date: NaiveDate) -> MonthGroup {
    MonthGroup {
        sort_key: format!("{:04}-{:02}", date.year(), date.month()),
        label: date.format("%B %Y").to_string(),
    }
}
