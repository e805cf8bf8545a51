//! Preset analyses that turn reconciled records into labelled, unit-tagged
//! series for a plotting front end.

pub mod catalog;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, EngineResult},
    models::{Category, FieldValue},
    reconcile::Reconciler,
    series::{aggregate, extract, Periodicity},
    utils::dates::ensure_range,
};

pub use catalog::{describe, MeasurementInfo, Unit};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Analysis {
    ScoresDaily,
    SleepDurations,
    SleepScoreDistribution,
    ReadinessScoreDistribution,
    ActivityScoreDistribution,
    BedtimesDaily,
}

impl Analysis {
    pub const ALL: [Analysis; 6] = [
        Analysis::ScoresDaily,
        Analysis::SleepDurations,
        Analysis::SleepScoreDistribution,
        Analysis::ReadinessScoreDistribution,
        Analysis::ActivityScoreDistribution,
        Analysis::BedtimesDaily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Analysis::ScoresDaily => "scores-daily",
            Analysis::SleepDurations => "sleep-durations",
            Analysis::SleepScoreDistribution => "sleep-score-distribution",
            Analysis::ReadinessScoreDistribution => "readiness-score-distribution",
            Analysis::ActivityScoreDistribution => "activity-score-distribution",
            Analysis::BedtimesDaily => "bedtimes-daily",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Analysis::ScoresDaily => "Daily Scores",
            Analysis::SleepDurations => "Sleep Times",
            Analysis::SleepScoreDistribution => "Sleep Score Distribution",
            Analysis::ReadinessScoreDistribution => "Readiness Score Distribution",
            Analysis::ActivityScoreDistribution => "Activity Score Distribution",
            Analysis::BedtimesDaily => "Daily Bedtimes",
        }
    }

    /// The (category, field) pairs plotted, in legend order.
    pub fn measurements(&self) -> &'static [(Category, &'static str)] {
        match self {
            Analysis::ScoresDaily => &[
                (Category::Sleep, "score"),
                (Category::Readiness, "score"),
                (Category::Activity, "score"),
            ],
            Analysis::SleepDurations => &[
                (Category::Sleep, "deep"),
                (Category::Sleep, "rem"),
                (Category::Sleep, "light"),
                (Category::Sleep, "awake"),
            ],
            Analysis::SleepScoreDistribution => &[(Category::Sleep, "score")],
            Analysis::ReadinessScoreDistribution => &[(Category::Readiness, "score")],
            Analysis::ActivityScoreDistribution => &[(Category::Activity, "score")],
            Analysis::BedtimesDaily => &[
                (Category::Sleep, "bedtime_start_delta"),
                (Category::Sleep, "duration"),
            ],
        }
    }

    /// Categories that must be reconciled before running this analysis.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> =
            self.measurements().iter().map(|(category, _)| *category).collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn default_periodicity(&self) -> Periodicity {
        Periodicity::Daily
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPoint {
    /// Bucket label, e.g. `2021-03-04`, `2021-W09` or `Mon`
    pub label: String,
    pub value: Option<FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSeries {
    pub category: Category,
    pub field: String,
    pub label: String,
    pub unit: Unit,
    pub points: Vec<ReportPoint>,
}

pub fn run_analysis(
    reconciler: &Reconciler,
    analysis: Analysis,
    start: NaiveDate,
    end: NaiveDate,
    periodicity: Periodicity,
) -> EngineResult<Vec<ReportSeries>> {
    run_measurements(
        reconciler,
        analysis.as_str(),
        analysis.measurements(),
        start,
        end,
        periodicity,
    )
}

/// Build one report series per measurement from the reconciler's records.
///
/// All measurements must share a display unit so they can be drawn on one
/// axis. Numeric values are scaled after aggregation.
pub fn run_measurements(
    reconciler: &Reconciler,
    name: &str,
    measurements: &[(Category, &str)],
    start: NaiveDate,
    end: NaiveDate,
    periodicity: Periodicity,
) -> EngineResult<Vec<ReportSeries>> {
    ensure_range(start, end)?;

    let infos: Vec<MeasurementInfo> = measurements
        .iter()
        .map(|(category, field)| describe(*category, field))
        .collect();
    if let Some(first) = infos.first() {
        if infos.iter().any(|info| info.unit != first.unit) {
            return Err(EngineError::MixedUnits {
                analysis: name.to_string(),
            });
        }
    }

    let mut report = Vec::with_capacity(measurements.len());
    for ((category, field), info) in measurements.iter().zip(infos) {
        let series = extract(*category, reconciler.records(*category), start, end, field)?;
        let buckets = aggregate(&series, periodicity)?;
        log_debug!(
            "{name}: {category} {field} -> {} {periodicity} buckets",
            buckets.len()
        );

        let points = buckets
            .into_iter()
            .map(|bucket| ReportPoint {
                label: bucket.label.to_string(),
                value: bucket.value.map(|value| match value {
                    FieldValue::Number(number) => FieldValue::Number(number * info.scale),
                    other => other,
                }),
            })
            .collect();

        report.push(ReportSeries {
            category: *category,
            field: field.to_string(),
            label: info.label,
            unit: info.unit,
            points,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Record, sources::MemorySource, sources::Source};
    use std::sync::Arc;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    async fn reconciled(records: Vec<Record>) -> Reconciler {
        let source: Arc<dyn Source> =
            Arc::new(MemorySource::new("memory", &Category::ALL).with_records(records));
        let mut reconciler = Reconciler::default();
        reconciler
            .reconcile(&[Category::Sleep, Category::Readiness], date(1), date(7), &[source])
            .await
            .unwrap();
        reconciler
    }

    #[tokio::test]
    async fn durations_are_scaled_to_hours_and_bucketed() {
        let reconciler = reconciled(vec![
            Record::new(Category::Sleep, date(1))
                .with_field("deep", 3600.0)
                .with_field("rem", 5400.0)
                .with_field("light", 14400.0)
                .with_field("awake", 1800.0),
            Record::new(Category::Sleep, date(2))
                .with_field("deep", 7200.0)
                .with_field("rem", 5400.0)
                .with_field("light", 10800.0)
                .with_field("awake", 0.0),
        ])
        .await;

        let report = run_analysis(
            &reconciler,
            Analysis::SleepDurations,
            date(1),
            date(7),
            Periodicity::Weekly,
        )
        .unwrap();

        assert_eq!(report.len(), 4);
        let deep = &report[0];
        assert_eq!(deep.field, "deep");
        assert_eq!(deep.unit, Unit::Hours);
        // 2021-03-01 is a Monday, so the whole range is ISO week 9
        assert_eq!(deep.points.len(), 1);
        assert_eq!(deep.points[0].label, "2021-W09");
        let hours = deep.points[0].value.and_then(|v| v.as_number()).unwrap();
        assert!((hours - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn daily_scores_keep_gaps() {
        let reconciler = reconciled(vec![
            Record::new(Category::Sleep, date(1)).with_field("score", 80.0),
            Record::new(Category::Readiness, date(2)).with_field("score", 70.0),
        ])
        .await;

        let report = run_measurements(
            &reconciler,
            "scores",
            &[(Category::Sleep, "score"), (Category::Readiness, "score")],
            date(1),
            date(3),
            Periodicity::Daily,
        )
        .unwrap();

        assert_eq!(report[0].points.len(), 3);
        assert_eq!(report[0].points[0].value, Some(FieldValue::Number(80.0)));
        assert_eq!(report[0].points[1].value, None);
        assert_eq!(report[1].label, "Readiness Score");
        assert_eq!(report[1].points[1].label, "2021-03-02");
    }

    #[tokio::test]
    async fn mixing_units_is_rejected() {
        let reconciler = Reconciler::default();
        let err = run_measurements(
            &reconciler,
            "mixed",
            &[(Category::Sleep, "score"), (Category::Sleep, "deep")],
            date(1),
            date(7),
            Periodicity::Daily,
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::MixedUnits { ref analysis } if analysis == "mixed"));
        assert!(err.is_usage_error());
    }

    #[test]
    fn presets_are_unit_consistent() {
        for analysis in Analysis::ALL {
            let units: Vec<Unit> = analysis
                .measurements()
                .iter()
                .map(|(category, field)| describe(*category, field).unit)
                .collect();
            assert!(units.windows(2).all(|pair| pair[0] == pair[1]), "{analysis}");
            assert_eq!(analysis.default_periodicity(), Periodicity::Daily);
        }
        assert_eq!(
            Analysis::ScoresDaily.categories(),
            vec![Category::Sleep, Category::Readiness, Category::Activity]
        );
    }
}
