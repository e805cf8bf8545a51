//! Data sources the reconciler can pull daily records from.
//!
//! A source answers one `(category, date)` question at a time:
//! `Ok(Some(record))` when it has the data, `Ok(None)` when it simply does
//! not, and `Err` only for faults (unsupported category, malformed payload,
//! broken storage). Faults abort the reconcile run.
//!
//! - [`memory`]: in-memory map, used as a warm cache and in tests
//! - [`remote`]: ring-tracking API payload normalization over a pluggable transport
//! - [`manual`]: subjective measurements entered by the user
//! - the SQLite [`RecordStore`](crate::db::RecordStore) also implements [`Source`]

pub mod manual;
pub mod memory;
pub mod remote;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Category, Record};

pub use manual::{EntryPrompt, ManualEntrySource, TrackingItem, TrackingKind};
pub use memory::MemorySource;
pub use remote::{RemoteSource, SummaryTransport};

#[async_trait]
pub trait Source: Send + Sync {
    /// Name used for attribution and error messages.
    fn name(&self) -> &str;

    fn supported_categories(&self) -> &[Category];

    fn supports(&self, category: Category) -> bool {
        self.supported_categories().contains(&category)
    }

    /// Hint that `fetch` is about to be called for this range.
    async fn preload(&self, _categories: &[Category], _start: NaiveDate, _end: NaiveDate) -> Result<()> {
        Ok(())
    }

    async fn fetch(&self, category: Category, date: NaiveDate) -> Result<Option<Record>>;
}

/// Shared guard for `fetch` implementations.
pub(crate) fn ensure_supported(source: &dyn Source, category: Category) -> Result<()> {
    if !source.supports(category) {
        bail!(
            "source '{}' does not provide {} records",
            source.name(),
            category
        );
    }
    Ok(())
}
