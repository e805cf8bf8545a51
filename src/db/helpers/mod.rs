use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveTime};

use crate::models::{Category, FieldValue};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).with_context(|| format!("failed to parse {field}"))
}

pub fn parse_category(value: &str) -> Result<Category> {
    value
        .parse::<Category>()
        .map_err(|err| anyhow!("stored row has {err}"))
}

/// Split a value into the `(kind, value)` text columns it is stored as.
pub fn encode_value(value: &FieldValue) -> (&'static str, String) {
    let text = match value {
        FieldValue::Number(number) => number.to_string(),
        FieldValue::Bool(flag) => flag.to_string(),
        FieldValue::TimeOfDay(time) => time.format(TIME_FORMAT).to_string(),
    };
    (value.kind().as_str(), text)
}

pub fn decode_value(kind: &str, text: &str) -> Result<FieldValue> {
    match kind {
        "number" => text
            .parse::<f64>()
            .map(FieldValue::Number)
            .with_context(|| format!("invalid number '{text}'")),
        "bool" => text
            .parse::<bool>()
            .map(FieldValue::Bool)
            .with_context(|| format!("invalid bool '{text}'")),
        "time" => NaiveTime::parse_from_str(text, TIME_FORMAT)
            .map(FieldValue::TimeOfDay)
            .with_context(|| format!("invalid time of day '{text}'")),
        other => Err(anyhow!("unknown value kind {other}")),
    }
}
