use std::{collections::BTreeMap, fmt};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Bool,
    Time,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Number => "number",
            ValueKind::Bool => "bool",
            ValueKind::Time => "time",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measurement value. The variant is the value's declared kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    #[serde(rename = "time")]
    TimeOfDay(NaiveTime),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Number(_) => ValueKind::Number,
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::TimeOfDay(_) => ValueKind::Time,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        FieldValue::TimeOfDay(value)
    }
}

/// Measurements of one category for one calendar date.
///
/// Fields are a flat name → value map so a record can always be written as a
/// single row of `{category}_{field}` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub date: NaiveDate,
    pub category: Category,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(category: Category, date: NaiveDate) -> Self {
        Self {
            date,
            category,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Column name used by flat per-date tables.
    pub fn column_name(category: Category, field: &str) -> String {
        format!("{}_{}", category.as_str(), field)
    }

    pub fn flat_columns(&self) -> impl Iterator<Item = (String, FieldValue)> + '_ {
        self.fields
            .iter()
            .map(|(name, value)| (Self::column_name(self.category, name), *value))
    }
}
