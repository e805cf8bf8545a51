use serde::Serialize;

use crate::models::Category;

const SECONDS_TO_HOURS: f64 = 1.0 / 3600.0;

/// Display unit of a measurement after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Unit {
    Undefined,
    Hours,
    Score,
    Raw,
    Celsius,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Undefined => "",
            Unit::Hours => "Time in h",
            Unit::Score => "Score",
            Unit::Raw => "Raw",
            Unit::Celsius => "°C",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementInfo {
    pub label: String,
    pub unit: Unit,
    /// Factor applied to numeric values before display
    pub scale: f64,
}

struct Entry {
    field: &'static str,
    label: &'static str,
    unit: Unit,
    scale: f64,
}

const fn hours(field: &'static str, label: &'static str) -> Entry {
    Entry {
        field,
        label,
        unit: Unit::Hours,
        scale: SECONDS_TO_HOURS,
    }
}

const fn plain(field: &'static str, label: &'static str, unit: Unit) -> Entry {
    Entry {
        field,
        label,
        unit,
        scale: 1.0,
    }
}

const SLEEP: &[Entry] = &[
    hours("total", "Total Sleep Time"),
    hours("awake", "Awake Sleep Time"),
    hours("rem", "REM Sleep Time"),
    hours("light", "Light Sleep Time"),
    hours("deep", "Deep Sleep Time"),
    hours("duration", "Sleep Duration"),
    hours("bedtime_end_delta", "Bedtime End Delta"),
    hours("bedtime_start_delta", "Bedtime Start Delta"),
    hours("midpoint_at_delta", "Sleep Midpoint Delta"),
    hours("midpoint_time", "Sleep Midpoint"),
    plain("efficiency", "Sleep Efficiency", Unit::Score),
    plain("score", "Sleep Score", Unit::Score),
    plain("score_alignment", "Sleep Score Alignment", Unit::Score),
    plain("score_deep", "Deep Sleep Score", Unit::Score),
    plain("score_disturbances", "Sleep Disturbances Score", Unit::Score),
    plain("score_efficiency", "Sleep Efficiency Score", Unit::Score),
    plain("score_latency", "Sleep Latency Score", Unit::Score),
    plain("score_rem", "REM Sleep Score", Unit::Score),
    plain("score_total", "Total Sleep Score", Unit::Score),
    plain("rmssd", "RMSSD", Unit::Raw),
    plain("hr_average", "Average Heart Rate", Unit::Raw),
    plain("hr_lowest", "Lowest Heart Rate", Unit::Raw),
    plain("temperature_delta", "Temperature Delta", Unit::Celsius),
    plain("temperature_deviation", "Temperature Deviation", Unit::Celsius),
    plain("temperature_trend_deviation", "Temperature Trend Deviation", Unit::Raw),
];

const READINESS: &[Entry] = &[plain("score", "Readiness Score", Unit::Score)];

const ACTIVITY: &[Entry] = &[plain("score", "Activity Score", Unit::Score)];

fn entries(category: Category) -> &'static [Entry] {
    match category {
        Category::Sleep => SLEEP,
        Category::Readiness => READINESS,
        Category::Activity => ACTIVITY,
        Category::Bedtime | Category::Subjective => &[],
    }
}

/// Display label, unit and scale for a measurement.
///
/// Fields without a catalog entry are shown unscaled with an undefined unit.
pub fn describe(category: Category, field: &str) -> MeasurementInfo {
    match entries(category).iter().find(|entry| entry.field == field) {
        Some(entry) => MeasurementInfo {
            label: entry.label.to_string(),
            unit: entry.unit,
            scale: entry.scale,
        },
        None => MeasurementInfo {
            label: format!("{category} {field}"),
            unit: Unit::Undefined,
            scale: 1.0,
        },
    }
}
