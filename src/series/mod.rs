//! Dense daily projection of reconciled records and periodic aggregation.

pub mod aggregate;
pub mod extract;

pub use aggregate::{aggregate, Bucket, BucketLabel, Periodicity};
pub use extract::{extract, DenseSeries, SeriesPoint};
