use std::collections::{BTreeMap, HashSet};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ensure_supported, Source};
use crate::models::{Category, FieldValue, Record};

const SUPPORTED: [Category; 1] = [Category::Subjective];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingKind {
    Bool,
    Number,
    Percentage,
}

/// A subjective measurement the user has chosen to track every day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingItem {
    pub name: String,
    pub kind: TrackingKind,
}

impl TrackingItem {
    pub fn new(name: impl Into<String>, kind: TrackingKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    fn validate(&self, value: &FieldValue) -> Result<()> {
        match (self.kind, value) {
            (TrackingKind::Bool, FieldValue::Bool(_)) => Ok(()),
            (TrackingKind::Number, FieldValue::Number(number)) if number.is_finite() => Ok(()),
            (TrackingKind::Percentage, FieldValue::Number(number))
                if (0.0..=100.0).contains(number) =>
            {
                Ok(())
            }
            (kind, other) => Err(anyhow!(
                "answer for '{}' must be a {kind:?} value, got {other:?}",
                self.name
            )),
        }
    }
}

/// Asks the user for the tracked values of one day.
///
/// Returning `Ok(None)` means the user skipped the date; it stays missing.
#[async_trait]
pub trait EntryPrompt: Send + Sync {
    async fn ask(
        &self,
        date: NaiveDate,
        items: &[TrackingItem],
    ) -> Result<Option<BTreeMap<String, FieldValue>>>;
}

pub struct ManualEntrySource<P> {
    name: String,
    items: Vec<TrackingItem>,
    prompt: P,
}

impl<P: EntryPrompt> ManualEntrySource<P> {
    pub fn new(items: Vec<TrackingItem>, prompt: P) -> Result<Self> {
        let mut seen = HashSet::new();
        for item in &items {
            if item.name.trim().is_empty() {
                bail!("tracking item names must not be empty");
            }
            if !seen.insert(item.name.as_str()) {
                bail!("tracking item '{}' is declared more than once", item.name);
            }
        }

        Ok(Self {
            name: "manual".into(),
            items,
            prompt,
        })
    }

    pub fn items(&self) -> &[TrackingItem] {
        &self.items
    }
}

#[async_trait]
impl<P: EntryPrompt> Source for ManualEntrySource<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_categories(&self) -> &[Category] {
        &SUPPORTED
    }

    async fn fetch(&self, category: Category, date: NaiveDate) -> Result<Option<Record>> {
        ensure_supported(self, category)?;

        let Some(mut answers) = self.prompt.ask(date, &self.items).await? else {
            return Ok(None);
        };

        let mut record = Record::new(Category::Subjective, date);
        for item in &self.items {
            // Items left unanswered stay absent from the record.
            if let Some(value) = answers.remove(&item.name) {
                item.validate(&value)?;
                record.insert(item.name.clone(), value);
            }
        }

        if let Some(unknown) = answers.keys().next() {
            bail!("answer for undeclared tracking item '{unknown}'");
        }

        Ok(Some(record))
    }
}
