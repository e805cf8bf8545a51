pub mod config;
pub mod reconciler;
pub mod required_dates;

pub use config::ReconcilerConfig;
pub use reconciler::{ReconcileReport, Reconciler, SourceTally};
pub use required_dates::RequiredDateSet;
