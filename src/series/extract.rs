use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    error::{EngineError, EngineResult},
    models::{Category, FieldValue, Record, ValueKind},
    utils::dates::{dates_between, days_in_range, ensure_range},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Option<FieldValue>,
}

/// One value slot per calendar date of a range; gaps are explicit `None`s.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenseSeries {
    pub category: Category,
    pub field: String,
    /// Kind shared by every present value; `Number` when nothing was observed.
    pub kind: ValueKind,
    pub points: Vec<SeriesPoint>,
}

impl DenseSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of dates that carry a value.
    pub fn observed(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ValueKind::Number
    }
}

/// Project `field` of date-sorted `records` onto every date of `[start, end]`.
///
/// Records outside the range are skipped. If records exist in the range but
/// none of them carries `field`, the field is reported as not tracked rather
/// than returned as an all-empty series.
pub fn extract(
    category: Category,
    records: &[Record],
    start: NaiveDate,
    end: NaiveDate,
    field: &str,
) -> EngineResult<DenseSeries> {
    ensure_range(start, end)?;
    debug_assert!(
        records.windows(2).all(|pair| pair[0].date <= pair[1].date),
        "records must be sorted by date"
    );

    let mut cursor = records.iter().peekable();
    let mut kind: Option<ValueKind> = None;
    let mut matched_any = false;
    let mut points = Vec::with_capacity(days_in_range(start, end));

    for date in dates_between(start, end) {
        while cursor.next_if(|record| record.date < date).is_some() {}

        let value = match cursor.next_if(|record| record.date == date) {
            Some(record) => {
                matched_any = true;
                record.get(field).copied()
            }
            None => None,
        };

        if let Some(value) = value {
            match kind {
                None => kind = Some(value.kind()),
                Some(expected) if expected != value.kind() => {
                    return Err(EngineError::MixedValueKinds {
                        category,
                        field: field.to_string(),
                        date,
                        expected,
                        found: value.kind(),
                    });
                }
                Some(_) => {}
            }
        }

        points.push(SeriesPoint { date, value });
    }

    if matched_any && kind.is_none() {
        return Err(EngineError::FieldNotTracked {
            category,
            field: field.to_string(),
        });
    }

    Ok(DenseSeries {
        category,
        field: field.to_string(),
        kind: kind.unwrap_or(ValueKind::Number),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, day).unwrap()
    }

    fn scored(day: u32, score: f64) -> Record {
        Record::new(Category::Sleep, date(day)).with_field("score", score)
    }

    #[test]
    fn gaps_become_explicit_none() {
        let records = vec![scored(1, 70.0), scored(3, 80.0)];
        let series = extract(Category::Sleep, &records, date(1), date(3), "score").unwrap();

        let values: Vec<Option<FieldValue>> = series.points.iter().map(|p| p.value).collect();
        assert_eq!(
            values,
            vec![Some(FieldValue::Number(70.0)), None, Some(FieldValue::Number(80.0))]
        );
        assert_eq!(series.observed(), 2);
    }

    #[test]
    fn length_matches_range_whatever_the_records() {
        let records = vec![scored(2, 1.0), scored(9, 2.0), scored(20, 3.0)];
        for (start, end) in [(1, 1), (1, 10), (5, 31), (21, 31)] {
            let series = extract(Category::Sleep, &records, date(start), date(end), "score").unwrap();
            assert_eq!(series.len(), days_in_range(date(start), date(end)));
            assert_eq!(series.points.first().unwrap().date, date(start));
            assert_eq!(series.points.last().unwrap().date, date(end));
        }
    }

    #[test]
    fn records_outside_range_are_skipped() {
        let records = vec![scored(1, 10.0), scored(2, 20.0), scored(5, 50.0), scored(8, 80.0)];
        let series = extract(Category::Sleep, &records, date(2), date(6), "score").unwrap();
        let values: Vec<Option<f64>> = series
            .points
            .iter()
            .map(|p| p.value.and_then(|v| v.as_number()))
            .collect();
        assert_eq!(values, vec![Some(20.0), None, None, Some(50.0), None]);
    }

    #[test]
    fn field_missing_on_some_records_is_a_gap() {
        let records = vec![
            scored(1, 70.0),
            Record::new(Category::Sleep, date(2)).with_field("rem", 3600.0),
            scored(3, 90.0),
        ];
        let series = extract(Category::Sleep, &records, date(1), date(3), "score").unwrap();
        assert_eq!(series.points[1].value, None);
        assert_eq!(series.points[2].value, Some(FieldValue::Number(90.0)));
    }

    #[test]
    fn untracked_field_differs_from_no_observations() {
        let records = vec![scored(1, 70.0), scored(2, 75.0)];
        let err = extract(Category::Sleep, &records, date(1), date(2), "hrv").unwrap_err();
        assert!(matches!(err, EngineError::FieldNotTracked { .. }));

        let empty = extract(Category::Sleep, &[], date(1), date(2), "hrv").unwrap();
        assert_eq!(empty.len(), 2);
        assert_eq!(empty.observed(), 0);
    }

    #[test]
    fn time_values_keep_their_kind() {
        let bedtime = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        let records = vec![Record::new(Category::Sleep, date(1)).with_field("bedtime_start", bedtime)];
        let series = extract(Category::Sleep, &records, date(1), date(2), "bedtime_start").unwrap();
        assert_eq!(series.kind, ValueKind::Time);
        assert!(!series.is_numeric());
    }

    #[test]
    fn mixed_kinds_are_rejected() {
        let records = vec![
            Record::new(Category::Subjective, date(1)).with_field("mood", 50.0),
            Record::new(Category::Subjective, date(2)).with_field("mood", true),
        ];
        let err = extract(Category::Subjective, &records, date(1), date(2), "mood").unwrap_err();
        assert!(matches!(err, EngineError::MixedValueKinds { .. }));
    }
}
