use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use super::{ensure_supported, Source};
use crate::models::{Category, Record};

/// Records held in memory, keyed by `(category, date)`.
pub struct MemorySource {
    name: String,
    categories: Vec<Category>,
    records: RwLock<HashMap<(Category, NaiveDate), Record>>,
    fetch_count: AtomicUsize,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, categories: &[Category]) -> Self {
        Self {
            name: name.into(),
            categories: categories.to_vec(),
            records: RwLock::new(HashMap::new()),
            fetch_count: AtomicUsize::new(0),
        }
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        let map = self
            .records
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for record in records {
            map.insert((record.category, record.date), record);
        }
        self
    }

    pub fn insert(&self, record: Record) {
        let mut guard = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert((record.category, record.date), record);
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `fetch` calls answered so far.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_categories(&self) -> &[Category] {
        &self.categories
    }

    async fn fetch(&self, category: Category, date: NaiveDate) -> Result<Option<Record>> {
        ensure_supported(self, category)?;
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        let guard = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.get(&(category, date)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn answers_known_dates_and_misses_others() {
        let source = MemorySource::new("cache", &[Category::Sleep])
            .with_records([Record::new(Category::Sleep, date("2021-03-02")).with_field("score", 80.0)]);

        let hit = source.fetch(Category::Sleep, date("2021-03-02")).await.unwrap();
        assert_eq!(hit.unwrap().get("score"), Some(&FieldValue::Number(80.0)));

        let miss = source.fetch(Category::Sleep, date("2021-03-03")).await.unwrap();
        assert!(miss.is_none());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn inserted_records_replace_by_date() {
        let source = MemorySource::new("cache", &[Category::Sleep]);
        assert!(source.is_empty());

        source.insert(Record::new(Category::Sleep, date("2021-03-02")).with_field("score", 60.0));
        source.insert(Record::new(Category::Sleep, date("2021-03-02")).with_field("score", 65.0));
        assert_eq!(source.len(), 1);

        let hit = source.fetch(Category::Sleep, date("2021-03-02")).await.unwrap();
        assert_eq!(hit.unwrap().get("score"), Some(&FieldValue::Number(65.0)));
    }

    #[tokio::test]
    async fn unsupported_category_is_a_fault() {
        let source = MemorySource::new("cache", &[Category::Sleep]);
        let err = source
            .fetch(Category::Subjective, date("2021-03-02"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not provide subjective"));
    }
}
