use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Class of daily measurements a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sleep,
    Readiness,
    Activity,
    Bedtime,
    Subjective,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Sleep,
        Category::Readiness,
        Category::Activity,
        Category::Bedtime,
        Category::Subjective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sleep => "sleep",
            Category::Readiness => "readiness",
            Category::Activity => "activity",
            Category::Bedtime => "bedtime",
            Category::Subjective => "subjective",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sleep" => Ok(Category::Sleep),
            "readiness" => Ok(Category::Readiness),
            "activity" => Ok(Category::Activity),
            "bedtime" => Ok(Category::Bedtime),
            "subjective" => Ok(Category::Subjective),
            other => Err(EngineError::UnknownCategory(other.to_string())),
        }
    }
}
