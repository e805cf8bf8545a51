use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    db::RecordStore,
    reconcile::{Reconciler, ReconcilerConfig},
    series::Periodicity,
    sources::TrackingItem,
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Persisted engine configuration.
///
/// `open_store` and `build_reconciler` build engine parts from these values. The
/// access token and default periodicity are only held for the embedding
/// application, which owns the API transport and the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// SQLite file opened by `open_store`
    pub store_path: PathBuf,
    /// Bearer token for the application's `SummaryTransport`
    pub access_token: Option<String>,
    /// Items for `ManualEntrySource`
    pub tracking_items: Vec<TrackingItem>,
    pub reconciler: ReconcilerConfig,
    /// Periodicity a front end shows before the user picks one
    pub default_periodicity: Periodicity,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("qsdash.sqlite3"),
            access_token: None,
            tracking_items: Vec::new(),
            reconciler: ReconcilerConfig::default(),
            default_periodicity: Periodicity::Daily,
        }
    }
}

impl EngineSettings {
    pub fn open_store(&self) -> Result<RecordStore> {
        RecordStore::open(self.store_path.clone())
            .with_context(|| format!("Failed to open record store {}", self.store_path.display()))
    }

    pub fn build_reconciler(&self) -> Reconciler {
        Reconciler::new(self.reconciler.clone())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file does
    /// not exist yet. A file that exists but cannot be parsed is reported and
    /// replaced by defaults in memory; it is only overwritten on the next update.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "Ignoring unreadable settings file {}: {err}",
                    path.display()
                );
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> EngineSettings {
        self.read().clone()
    }

    pub fn tracking_items(&self) -> Vec<TrackingItem> {
        self.read().tracking_items.clone()
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        self.read().reconciler.clone()
    }

    /// Apply `change` to the settings and write them to disk.
    pub fn update<F>(&self, change: F) -> Result<EngineSettings>
    where
        F: FnOnce(&mut EngineSettings),
    {
        let mut guard = self.write();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn update_tracking_items(&self, items: Vec<TrackingItem>) -> Result<()> {
        self.update(|settings| settings.tracking_items = items)?;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: EngineSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
