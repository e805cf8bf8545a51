use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::utils::dates::dates_between;

/// Dates of one category that no source has produced yet.
///
/// Starts as the full requested range and only ever shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredDateSet {
    dates: BTreeSet<NaiveDate>,
}

impl RequiredDateSet {
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            dates: dates_between(start, end).into_iter().collect(),
        }
    }

    /// Drop dates that were already resolved by an earlier run.
    pub fn without<'a>(mut self, resolved: impl IntoIterator<Item = &'a NaiveDate>) -> Self {
        for date in resolved {
            self.dates.remove(date);
        }
        self
    }

    /// Returns `true` if the date was still pending.
    pub fn resolve(&mut self, date: NaiveDate) -> bool {
        self.dates.remove(&date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// Ordered copy to iterate over while the set shrinks.
    pub fn snapshot(&self) -> Vec<NaiveDate> {
        self.dates.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
