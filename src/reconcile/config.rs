use serde::{Deserialize, Serialize};

/// Tunables for a reconcile run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerConfig {
    /// Upper bound on fetches in flight against a single source
    pub max_concurrent_fetches: usize,

    /// Call `Source::preload` before each source's fetch pass
    pub preload: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            preload: true,
        }
    }
}
