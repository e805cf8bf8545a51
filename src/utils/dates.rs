use chrono::NaiveDate;

use crate::error::{EngineError, EngineResult};

pub fn ensure_range(start: NaiveDate, end: NaiveDate) -> EngineResult<()> {
    if start > end {
        return Err(EngineError::InvalidRange { start, end });
    }
    Ok(())
}

/// Every calendar date from `start` to `end`, both inclusive.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

/// Number of dates in the inclusive range, zero when `start > end`.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> usize {
    let days = (end - start).num_days() + 1;
    usize::try_from(days).unwrap_or(0)
}

pub fn parse_iso_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| anyhow::anyhow!("invalid date '{value}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    #[test]
    fn range_is_inclusive_and_crosses_month_ends() {
        let dates = dates_between(date("2021-02-27"), date("2021-03-02"));
        assert_eq!(
            dates,
            vec![
                date("2021-02-27"),
                date("2021-02-28"),
                date("2021-03-01"),
                date("2021-03-02"),
            ]
        );
        assert_eq!(days_in_range(date("2021-02-27"), date("2021-03-02")), 4);
    }

    #[test]
    fn single_day_range() {
        let day = date("2020-02-29");
        assert_eq!(dates_between(day, day), vec![day]);
        assert_eq!(days_in_range(day, day), 1);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = ensure_range(date("2021-03-02"), date("2021-03-01")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRange { .. }));
        assert_eq!(days_in_range(date("2021-03-02"), date("2021-03-01")), 0);
    }

    #[test]
    fn rejects_non_iso_dates() {
        assert!(parse_iso_date("03/04/2021").is_err());
        assert!(parse_iso_date("2021-02-30").is_err());
    }
}
