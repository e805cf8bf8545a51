use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::params;

use crate::{
    db::{
        connection::RecordStore,
        helpers::{decode_value, encode_value, format_date, parse_category, parse_date},
    },
    models::{Category, FieldValue, Record},
    reconcile::Reconciler,
    sources::{ensure_supported, Source},
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

impl RecordStore {
    /// Persist records field by field. Values already stored for a
    /// `(date, category, field)` are kept; new fields fill the gaps.
    ///
    /// Returns the number of field values written.
    pub async fn save_records(&self, records: Vec<Record>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        self.execute(move |conn| {
            let tx = conn.transaction().context("failed to open save transaction")?;
            let updated_at = Utc::now().to_rfc3339();
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO measurements (summary_date, category, field, kind, value, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for record in &records {
                    let date = format_date(record.date);
                    for (field, value) in &record.fields {
                        let (kind, text) = encode_value(value);
                        written += stmt
                            .execute(params![
                                date,
                                record.category.as_str(),
                                field,
                                kind,
                                text,
                                updated_at
                            ])
                            .with_context(|| {
                                format!("failed to store {} {field} for {date}", record.category)
                            })?;
                    }
                }
            }
            tx.commit().context("failed to commit saved records")?;
            Ok(written)
        })
        .await
    }

    /// Persist every reconciled record that did not come from this store.
    pub async fn save_reconciled(&self, reconciler: &Reconciler) -> Result<usize> {
        let fresh: Vec<Record> = reconciler
            .all_records()
            .filter(|record| {
                reconciler.resolved_by(record.category, record.date) != Some(self.name())
            })
            .cloned()
            .collect();
        let records = fresh.len();
        let written = self.save_records(fresh).await?;
        log_info!("Stored {written} values from {records} reconciled records");
        Ok(written)
    }

    pub async fn load_record(&self, category: Category, date: NaiveDate) -> Result<Option<Record>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT field, kind, value
                 FROM measurements
                 WHERE category = ?1 AND summary_date = ?2
                 ORDER BY field",
            )?;
            let rows = stmt.query_map(params![category.as_str(), format_date(date)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut record = Record::new(category, date);
            for row in rows {
                let (field, kind, value) = row?;
                let value = decode_value(&kind, &value)
                    .with_context(|| format!("corrupt {category} {field} stored for {date}"))?;
                record.insert(field, value);
            }

            Ok((!record.fields.is_empty()).then_some(record))
        })
        .await
    }

    /// Dates in `[start, end]` that have at least one stored value for `category`.
    pub async fn stored_dates(
        &self,
        category: Category,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT summary_date
                 FROM measurements
                 WHERE category = ?1 AND summary_date BETWEEN ?2 AND ?3
                 ORDER BY summary_date",
            )?;
            let rows = stmt.query_map(
                params![category.as_str(), format_date(start), format_date(end)],
                |row| row.get::<_, String>(0),
            )?;

            let mut dates = Vec::new();
            for row in rows {
                dates.push(parse_date(&row?, "summary_date")?);
            }
            Ok(dates)
        })
        .await
    }

    /// All values stored for one date as `{category}_{field}` columns.
    pub async fn flat_row(&self, date: NaiveDate) -> Result<BTreeMap<String, FieldValue>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT category, field, kind, value
                 FROM measurements
                 WHERE summary_date = ?1",
            )?;
            let rows = stmt.query_map(params![format_date(date)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;

            let mut columns = BTreeMap::new();
            for row in rows {
                let (category, field, kind, value) = row?;
                let category = parse_category(&category)?;
                columns.insert(
                    Record::column_name(category, &field),
                    decode_value(&kind, &value)?,
                );
            }
            Ok(columns)
        })
        .await
    }
}

#[async_trait]
impl Source for RecordStore {
    fn name(&self) -> &str {
        "store"
    }

    fn supported_categories(&self) -> &[Category] {
        &Category::ALL
    }

    async fn fetch(&self, category: Category, date: NaiveDate) -> Result<Option<Record>> {
        ensure_supported(self, category)?;
        self.load_record(category, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use tempfile::TempDir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    fn open_store() -> (TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("nested").join("records.sqlite3")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn saved_records_come_back_with_their_kinds() {
        let (_dir, store) = open_store();
        let bedtime = NaiveTime::from_hms_opt(23, 40, 0).unwrap();
        let record = Record::new(Category::Sleep, date(4))
            .with_field("score", 81.0)
            .with_field("is_longest", true)
            .with_field("bedtime_start", bedtime);

        assert_eq!(store.save_records(vec![record.clone()]).await.unwrap(), 3);

        let loaded = store.load_record(Category::Sleep, date(4)).await.unwrap();
        assert_eq!(loaded, Some(record));
        assert!(store.load_record(Category::Sleep, date(5)).await.unwrap().is_none());
        assert!(store.load_record(Category::Readiness, date(4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn existing_values_win_and_new_fields_fill_gaps() {
        let (_dir, store) = open_store();
        store
            .save_records(vec![Record::new(Category::Sleep, date(4)).with_field("score", 81.0)])
            .await
            .unwrap();

        let written = store
            .save_records(vec![Record::new(Category::Sleep, date(4))
                .with_field("score", 10.0)
                .with_field("rem", 5400.0)])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let loaded = store.load_record(Category::Sleep, date(4)).await.unwrap().unwrap();
        assert_eq!(loaded.get("score"), Some(&FieldValue::Number(81.0)));
        assert_eq!(loaded.get("rem"), Some(&FieldValue::Number(5400.0)));
    }

    #[tokio::test]
    async fn flat_row_prefixes_columns_with_category() {
        let (_dir, store) = open_store();
        store
            .save_records(vec![
                Record::new(Category::Sleep, date(4)).with_field("score", 81.0),
                Record::new(Category::Subjective, date(4)).with_field("alcohol", false),
                Record::new(Category::Sleep, date(5)).with_field("score", 70.0),
            ])
            .await
            .unwrap();

        let row = store.flat_row(date(4)).await.unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row["sleep_score"], FieldValue::Number(81.0));
        assert_eq!(row["subjective_alcohol"], FieldValue::Bool(false));

        let dates = store.stored_dates(Category::Sleep, date(1), date(31)).await.unwrap();
        assert_eq!(dates, vec![date(4), date(5)]);
    }

    #[tokio::test]
    async fn reconciled_records_are_written_back_once() {
        use crate::sources::MemorySource;
        use std::sync::Arc;

        let (_dir, store) = open_store();
        store
            .save_records(vec![Record::new(Category::Sleep, date(1)).with_field("score", 90.0)])
            .await
            .unwrap();
        let remote = MemorySource::new("remote", &[Category::Sleep]).with_records(vec![
            Record::new(Category::Sleep, date(1)).with_field("score", 10.0),
            Record::new(Category::Sleep, date(2)).with_field("score", 75.0),
        ]);
        let sources: Vec<Arc<dyn Source>> = vec![Arc::new(store.clone()), Arc::new(remote)];

        let mut reconciler = Reconciler::default();
        let report = reconciler
            .reconcile(&[Category::Sleep], date(1), date(3), &sources)
            .await
            .unwrap();
        assert_eq!(report.missing_count(), 1);

        assert_eq!(store.save_reconciled(&reconciler).await.unwrap(), 1);
        let first = store.load_record(Category::Sleep, date(1)).await.unwrap().unwrap();
        assert_eq!(first.get("score"), Some(&FieldValue::Number(90.0)));
        assert!(store.load_record(Category::Sleep, date(2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn store_acts_as_a_source() {
        let (dir, store) = open_store();
        store
            .save_records(vec![Record::new(Category::Readiness, date(2)).with_field("score", 66.0)])
            .await
            .unwrap();
        drop(store);

        // reopening runs migrations against the existing file
        let reopened = RecordStore::open(dir.path().join("nested").join("records.sqlite3")).unwrap();
        let record = reopened.fetch(Category::Readiness, date(2)).await.unwrap();
        assert!(record.is_some());
        assert_eq!(reopened.supported_categories().len(), Category::ALL.len());
    }
}
