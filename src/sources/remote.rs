use std::{collections::HashMap, sync::RwLock};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde_json::{Map, Value};

use super::{ensure_supported, Source};
use crate::{
    models::{Category, FieldValue, Record},
    utils::dates::parse_iso_date,
};

const ENABLE_LOGS: bool = true;

const SUPPORTED: [Category; 4] = [
    Category::Sleep,
    Category::Readiness,
    Category::Activity,
    Category::Bedtime,
];

const SUMMARY_DATE: &str = "summary_date";

/// Raw access to the ring-tracking API.
///
/// Implementations own HTTP, authentication and timeouts. A non-success
/// response is reported as `Ok(None)`.
#[async_trait]
pub trait SummaryTransport: Send + Sync {
    async fn get_summary(
        &self,
        category: Category,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Value>>;
}

pub struct RemoteSource<T> {
    name: String,
    transport: T,
    /// Bulk answers by date; `None` marks a date the bulk response could not
    /// settle because it carried several entries for it.
    preloaded: RwLock<HashMap<(Category, NaiveDate), Option<Record>>>,
}

impl<T: SummaryTransport> RemoteSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            name: "remote".into(),
            transport,
            preloaded: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, category: Category, date: NaiveDate) -> Option<Option<Record>> {
        self.preloaded
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(category, date))
            .cloned()
    }
}

#[async_trait]
impl<T: SummaryTransport> Source for RemoteSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_categories(&self) -> &[Category] {
        &SUPPORTED
    }

    async fn preload(&self, categories: &[Category], start: NaiveDate, end: NaiveDate) -> Result<()> {
        for &category in categories.iter().filter(|c| self.supports(**c)) {
            let Some(payload) = self.transport.get_summary(category, start, end).await? else {
                crate::log_warn!("bulk {category} request for {start}..{end} was not answered");
                continue;
            };

            let records = records_from_payload(category, payload)?;
            crate::log_debug!("preloaded {} {category} records", records.len());

            let mut by_date: HashMap<NaiveDate, Option<Record>> = HashMap::new();
            for record in records {
                by_date
                    .entry(record.date)
                    .and_modify(|slot| *slot = None)
                    .or_insert(Some(record));
            }

            {
                let mut guard = self
                    .preloaded
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                for (date, record) in by_date {
                    guard.insert((category, date), record);
                }
            }
        }
        Ok(())
    }

    async fn fetch(&self, category: Category, date: NaiveDate) -> Result<Option<Record>> {
        ensure_supported(self, category)?;

        if let Some(settled) = self.cached(category, date) {
            return Ok(settled);
        }

        let Some(payload) = self.transport.get_summary(category, date, date).await? else {
            return Ok(None);
        };

        let mut records = records_from_payload(category, payload)?;
        if records.len() != 1 {
            return Ok(None);
        }

        let record = records.remove(0);
        if record.date != date {
            bail!(
                "asked for {category} on {date}, response is dated {}",
                record.date
            );
        }
        Ok(Some(record))
    }
}

/// Turn one API response body into flat records of `category`.
pub fn records_from_payload(category: Category, payload: Value) -> Result<Vec<Record>> {
    let mut body = make_uniform(payload)?;
    let entries = body
        .remove(category.as_str())
        .ok_or_else(|| anyhow!("response has no '{category}' list"))?;

    let Value::Array(entries) = entries else {
        bail!("'{category}' in response is not a list");
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(map) => entry_to_record(category, &map),
            other => Err(anyhow!("{category} entry is not an object: {other}")),
        })
        .collect()
}

/// Reshape the bedtime payload so it looks like every other category:
/// `ideal_bedtimes` becomes `bedtime`, `date` becomes `summary_date` and the
/// nested `bedtime_window` is flattened into two fields.
fn make_uniform(payload: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut body) = payload else {
        bail!("response body is not a JSON object");
    };

    let Some(bedtimes) = body.remove("ideal_bedtimes") else {
        return Ok(body);
    };

    let Value::Array(entries) = bedtimes else {
        bail!("'ideal_bedtimes' in response is not a list");
    };

    let mut uniform = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(mut entry) = entry else {
            bail!("bedtime entry is not an object");
        };

        if let Some(date) = entry.remove("date") {
            entry.insert(SUMMARY_DATE.into(), date);
        }
        if let Some(Value::Object(mut window)) = entry.remove("bedtime_window") {
            for edge in ["start", "end"] {
                if let Some(value) = window.remove(edge) {
                    entry.insert(format!("bedtime_window_{edge}"), value);
                }
            }
        }
        uniform.push(Value::Object(entry));
    }

    body.insert(Category::Bedtime.as_str().into(), Value::Array(uniform));
    Ok(body)
}

fn entry_to_record(category: Category, entry: &Map<String, Value>) -> Result<Record> {
    let date = entry
        .get(SUMMARY_DATE)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("{category} entry has no {SUMMARY_DATE}"))?;
    let date = parse_iso_date(date).with_context(|| format!("bad {SUMMARY_DATE} in {category} entry"))?;

    let mut record = Record::new(category, date);
    for (name, value) in entry {
        if name == SUMMARY_DATE {
            continue;
        }
        if let Some(value) = to_field_value(value) {
            record.insert(name.clone(), value);
        }
    }
    Ok(record)
}

/// Nested values and free text are dropped so records stay flat.
fn to_field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(number) => number.as_f64().map(FieldValue::Number),
        Value::Bool(flag) => Some(FieldValue::Bool(*flag)),
        Value::String(text) => parse_time_of_day(text).map(FieldValue::TimeOfDay),
        _ => None,
    }
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|timestamp| timestamp.naive_local().time())
        })
}
