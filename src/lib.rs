//! Reconciles daily health-tracking records from prioritized sources and turns
//! them into dense daily series and periodic averages.

pub mod utils;

pub mod analysis;
pub mod db;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod series;
pub mod settings;
pub mod sources;

pub use analysis::{run_analysis, Analysis, ReportPoint, ReportSeries};
pub use db::RecordStore;
pub use error::{EngineError, EngineResult};
pub use models::{Category, FieldValue, Record, ValueKind};
pub use reconcile::{ReconcileReport, Reconciler, ReconcilerConfig};
pub use series::{aggregate, extract, Bucket, BucketLabel, DenseSeries, Periodicity};
pub use settings::{EngineSettings, SettingsStore};
pub use sources::Source;
pub use utils::logging::init_logging;
