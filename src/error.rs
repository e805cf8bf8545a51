//! Error types for the reconciliation and aggregation engine.
//!
//! Missing dates are not errors; they are reported through
//! [`ReconcileReport`](crate::reconcile::ReconcileReport).

use chrono::NaiveDate;

use crate::{
    models::{Category, ValueKind},
    series::Periodicity,
};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("at least one category must be requested")]
    NoCategories,

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("field '{field}' is not tracked by any {category} record in range")]
    FieldNotTracked { category: Category, field: String },

    #[error("field '{field}' of {category} on {date} is a {found} value, earlier values were {expected}")]
    MixedValueKinds {
        category: Category,
        field: String,
        date: NaiveDate,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{periodicity} aggregation of '{field}' needs a numeric series, got {kind} values")]
    NonNumericSeries {
        field: String,
        kind: ValueKind,
        periodicity: Periodicity,
    },

    #[error("analysis '{analysis}' mixes measurements with different units")]
    MixedUnits { analysis: String },

    #[error("source '{source_name}' failed fetching {category} for {date}: {source:#}")]
    SourceFault {
        source_name: String,
        category: Category,
        date: NaiveDate,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// Caller mistakes that are never retried or corrected.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, EngineError::SourceFault { .. })
    }
}
