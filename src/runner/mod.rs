pub mod spec;
pub mod category;

use serde::{Deserialize, Serialize};

pub use spec::{CategorySetup, CategorySpec};
pub use category::CategoryRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    Sequential,
    BoundedParallel,
}

/// How many probes of one category may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyPolicy {
    pub mode: ConcurrencyMode,
    pub max_concurrent: usize,
}

impl ConcurrencyPolicy {
    pub fn sequential() -> Self {
        Self { mode: ConcurrencyMode::Sequential, max_concurrent: 1 }
    }

    pub fn bounded(max_concurrent: usize) -> Self {
        Self { mode: ConcurrencyMode::BoundedParallel, max_concurrent }
    }

    /// Probes allowed in flight; never below one.
    pub fn limit(&self) -> usize {
        match self.mode {
            ConcurrencyMode::Sequential => 1,
            ConcurrencyMode::BoundedParallel => self.max_concurrent.max(1),
        }
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self::sequential()
    }
}
