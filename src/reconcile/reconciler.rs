use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::anyhow;
use chrono::NaiveDate;
use futures::{stream, StreamExt};
use serde::Serialize;

use super::{config::ReconcilerConfig, required_dates::RequiredDateSet};
use crate::{
    error::{EngineError, EngineResult},
    log_info, log_warn,
    models::{Category, FieldValue, Record},
    sources::Source,
    utils::dates::ensure_range,
};

const ENABLE_LOGS: bool = true;

/// What one source contributed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTally {
    pub source: String,
    pub requested: usize,
    pub accepted: usize,
}

/// Outcome of a reconcile run. Missing dates are expected, not fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub sources: Vec<SourceTally>,
    pub missing: BTreeMap<Category, Vec<NaiveDate>>,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.missing.values().all(Vec::is_empty)
    }

    pub fn missing_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }
}

/// Merges records from prioritized sources into one record per
/// `(category, date)`; the first source to produce a date wins.
pub struct Reconciler {
    config: ReconcilerConfig,
    records: BTreeMap<Category, Vec<Record>>,
    provenance: HashMap<(Category, NaiveDate), String>,
    required: BTreeMap<Category, RequiredDateSet>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default())
    }
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            records: BTreeMap::new(),
            provenance: HashMap::new(),
            required: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Ask every source, in order, for the dates still missing in
    /// `[start, end]` for each requested category.
    ///
    /// Dates resolved by an earlier run are never requested again. A source
    /// fault aborts the run; records accepted before it are kept.
    pub async fn reconcile(
        &mut self,
        categories: &[Category],
        start: NaiveDate,
        end: NaiveDate,
        sources: &[Arc<dyn Source>],
    ) -> EngineResult<ReconcileReport> {
        ensure_range(start, end)?;

        let mut requested = categories.to_vec();
        requested.sort();
        requested.dedup();
        if requested.is_empty() {
            return Err(EngineError::NoCategories);
        }

        self.required = requested
            .iter()
            .map(|&category| {
                let resolved = self
                    .records
                    .get(&category)
                    .into_iter()
                    .flatten()
                    .map(|record| &record.date);
                (
                    category,
                    RequiredDateSet::for_range(start, end).without(resolved),
                )
            })
            .collect();

        log_info!(
            "Reconciling {} categories for {start}..{end} across {} sources",
            requested.len(),
            sources.len()
        );

        let mut tallies = Vec::with_capacity(sources.len());
        for source in sources {
            let tally = self
                .consult(source.as_ref(), &requested, start, end)
                .await?;
            tallies.push(tally);
        }

        let report = ReconcileReport {
            start,
            end,
            sources: tallies,
            missing: self.pending(),
        };

        if !report.is_complete() {
            for (category, dates) in report.missing.iter().filter(|(_, d)| !d.is_empty()) {
                log_warn!(
                    "{} {category} dates between {start} and {end} could not be resolved",
                    dates.len()
                );
            }
        }

        Ok(report)
    }

    /// One source pass. Every fetch of the pass completes before any result
    /// is applied, so the next source only ever sees this pass's leftovers.
    async fn consult(
        &mut self,
        source: &dyn Source,
        requested: &[Category],
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<SourceTally> {
        let common: Vec<Category> = requested
            .iter()
            .copied()
            .filter(|category| source.supports(*category))
            .collect();

        let pending: Vec<(Category, NaiveDate)> = common
            .iter()
            .flat_map(|&category| {
                self.required
                    .get(&category)
                    .map(RequiredDateSet::snapshot)
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |date| (category, date))
            })
            .collect();

        let mut tally = SourceTally {
            source: source.name().to_string(),
            requested: pending.len(),
            accepted: 0,
        };
        if pending.is_empty() {
            return Ok(tally);
        }

        if self.config.preload {
            if let Err(err) = source.preload(&common, start, end).await {
                log_warn!(
                    "Preload on source '{}' failed, fetching date by date: {err:#}",
                    source.name()
                );
            }
        }

        let limit = self.config.max_concurrent_fetches.max(1);
        let results: Vec<_> = stream::iter(pending)
            .map(|(category, date)| async move {
                (category, date, source.fetch(category, date).await)
            })
            .buffered(limit)
            .collect()
            .await;

        for (category, date, result) in results {
            let fault = |err: anyhow::Error| EngineError::SourceFault {
                source_name: source.name().to_string(),
                category,
                date,
                source: err,
            };

            match result {
                Ok(Some(record)) => {
                    if record.category != category || record.date != date {
                        return Err(fault(anyhow!(
                            "returned a {} record for {} instead",
                            record.category,
                            record.date
                        )));
                    }
                    self.accept(source.name(), record);
                    tally.accepted += 1;
                }
                Ok(None) => {}
                Err(err) => return Err(fault(err)),
            }
        }

        log_info!(
            "Source '{}' resolved {} of {} pending dates",
            tally.source,
            tally.accepted,
            tally.requested
        );
        Ok(tally)
    }

    fn accept(&mut self, source_name: &str, record: Record) {
        let key = (record.category, record.date);
        if self.provenance.contains_key(&key) {
            return;
        }

        if let Some(required) = self.required.get_mut(&record.category) {
            required.resolve(record.date);
        }

        let records = self.records.entry(record.category).or_default();
        let at = records.partition_point(|existing| existing.date < record.date);
        records.insert(at, record);
        self.provenance.insert(key, source_name.to_string());
    }

    /// Accepted records of one category, ascending by date.
    pub fn records(&self, category: Category) -> &[Record] {
        self.records
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn record(&self, category: Category, date: NaiveDate) -> Option<&Record> {
        let records = self.records(category);
        records
            .binary_search_by_key(&date, |record| record.date)
            .ok()
            .map(|index| &records[index])
    }

    pub fn records_within(&self, category: Category, start: NaiveDate, end: NaiveDate) -> &[Record] {
        let records = self.records(category);
        let from = records.partition_point(|record| record.date < start);
        let to = records.partition_point(|record| record.date <= end);
        if from >= to {
            return &[];
        }
        &records[from..to]
    }

    /// Name of the source that supplied this record.
    pub fn resolved_by(&self, category: Category, date: NaiveDate) -> Option<&str> {
        self.provenance.get(&(category, date)).map(String::as_str)
    }

    /// Dates of `category` still unresolved after the latest run.
    pub fn still_missing(&self, category: Category) -> Vec<NaiveDate> {
        self.required
            .get(&category)
            .map(RequiredDateSet::snapshot)
            .unwrap_or_default()
    }

    /// Outstanding demand of every category requested by the latest run.
    pub fn pending(&self) -> BTreeMap<Category, Vec<NaiveDate>> {
        self.required
            .iter()
            .map(|(category, required)| (*category, required.snapshot()))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.required.values().all(RequiredDateSet::is_empty)
    }

    pub fn all_records(&self) -> impl Iterator<Item = &Record> {
        self.records.values().flatten()
    }

    /// One flat `{category}_{field}` row per date, as the persistence layer stores it.
    pub fn flat_rows(&self) -> BTreeMap<NaiveDate, BTreeMap<String, FieldValue>> {
        let mut rows: BTreeMap<NaiveDate, BTreeMap<String, FieldValue>> = BTreeMap::new();
        for record in self.all_records() {
            rows.entry(record.date)
                .or_default()
                .extend(record.flat_columns());
        }
        rows
    }
}
