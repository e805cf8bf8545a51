use std::{collections::BTreeMap, fmt};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::extract::DenseSeries;
use crate::{
    error::{EngineError, EngineResult},
    models::FieldValue,
};

const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Weekday,
}

impl Periodicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::Daily => "daily",
            Periodicity::Weekly => "weekly",
            Periodicity::Monthly => "monthly",
            Periodicity::Yearly => "yearly",
            Periodicity::Weekday => "weekday",
        }
    }

    /// Bucket a date falls into. Weeks follow ISO 8601, so the first days of
    /// January can belong to the previous ISO year; months use the calendar.
    pub fn bucket_of(&self, date: NaiveDate) -> BucketLabel {
        match self {
            Periodicity::Daily => BucketLabel::Day(date),
            Periodicity::Weekly => {
                let week = date.iso_week();
                BucketLabel::Week {
                    iso_year: week.year(),
                    week: week.week(),
                }
            }
            Periodicity::Monthly => BucketLabel::Month {
                year: date.year(),
                month: date.month(),
            },
            Periodicity::Yearly => BucketLabel::Year(date.year()),
            Periodicity::Weekday => BucketLabel::Weekday(date.weekday().number_from_monday()),
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketLabel {
    Day(NaiveDate),
    Week { iso_year: i32, week: u32 },
    Month { year: i32, month: u32 },
    Year(i32),
    /// ISO weekday, 1 = Monday .. 7 = Sunday
    Weekday(u32),
}

impl BucketLabel {
    /// Chronological sort key within one periodicity.
    pub fn sort_key(&self) -> i64 {
        match self {
            BucketLabel::Day(date) => i64::from(date.num_days_from_ce()),
            BucketLabel::Week { iso_year, week } => i64::from(*iso_year) * 100 + i64::from(*week),
            BucketLabel::Month { year, month } => i64::from(*year) * 100 + i64::from(*month),
            BucketLabel::Year(year) => i64::from(*year),
            BucketLabel::Weekday(day) => i64::from(*day),
        }
    }
}

impl fmt::Display for BucketLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketLabel::Day(date) => write!(f, "{date}"),
            BucketLabel::Week { iso_year, week } => write!(f, "{iso_year}-W{week:02}"),
            BucketLabel::Month { year, month } => write!(f, "{year}-{month:02}"),
            BucketLabel::Year(year) => write!(f, "{year}"),
            BucketLabel::Weekday(day) => {
                let name = (*day as usize)
                    .checked_sub(1)
                    .and_then(|index| WEEKDAY_NAMES.get(index))
                    .copied()
                    .unwrap_or("?");
                f.write_str(name)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub label: BucketLabel,
    /// Mean of the observed values; `None` when no member carried a value.
    pub value: Option<FieldValue>,
    /// Dates of the series mapped into this bucket
    pub members: usize,
    /// Members that carried a value
    pub observations: usize,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    members: usize,
    observations: usize,
}

/// Group a dense daily series into periodic buckets, averaging each one.
///
/// `Daily` returns the series unchanged (any value kind). Every other
/// periodicity needs a numeric series. Buckets come out in chronological
/// order, or Monday..Sunday for `Weekday`.
pub fn aggregate(series: &DenseSeries, periodicity: Periodicity) -> EngineResult<Vec<Bucket>> {
    if periodicity == Periodicity::Daily {
        return Ok(series
            .points
            .iter()
            .map(|point| Bucket {
                label: BucketLabel::Day(point.date),
                value: point.value,
                members: 1,
                observations: usize::from(point.value.is_some()),
            })
            .collect());
    }

    let non_numeric = |kind| EngineError::NonNumericSeries {
        field: series.field.clone(),
        kind,
        periodicity,
    };
    if !series.is_numeric() {
        return Err(non_numeric(series.kind));
    }

    let mut groups: BTreeMap<i64, (BucketLabel, Accumulator)> = BTreeMap::new();
    for point in &series.points {
        let label = periodicity.bucket_of(point.date);
        let (_, acc) = groups
            .entry(label.sort_key())
            .or_insert_with(|| (label, Accumulator::default()));

        acc.members += 1;
        match point.value {
            Some(FieldValue::Number(value)) => {
                acc.sum += value;
                acc.observations += 1;
            }
            Some(other) => return Err(non_numeric(other.kind())),
            None => {}
        }
    }

    Ok(groups
        .into_values()
        .map(|(label, acc)| Bucket {
            label,
            value: (acc.observations > 0)
                .then(|| FieldValue::Number(acc.sum / acc.observations as f64)),
            members: acc.members,
            observations: acc.observations,
        })
        .collect())
}
