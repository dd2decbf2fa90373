//! Coarse progress for the in-flight stage

use serde::{Deserialize, Serialize};

/// Label plus a current/total counter. `total == 0` means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: String,
    pub current: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    /// Completed fraction, if the total is known
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some((self.current.min(self.total)) as f64 / self.total as f64)
        }
    }
}

/// Holds at most one snapshot; every update overwrites it
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    current: Option<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a stage at zero
    pub fn begin(&mut self, stage: impl Into<String>, total: u64) {
        self.update(stage, 0, total);
    }

    /// Replace the snapshot
    pub fn update(&mut self, stage: impl Into<String>, current: u64, total: u64) {
        self.current = Some(ProgressSnapshot {
            stage: stage.into(),
            current,
            total,
        });
    }

    /// Bump the counter, keeping label and total
    pub fn increment(&mut self) {
        if let Some(ref mut snapshot) = self.current {
            snapshot.current += 1;
        }
    }

    /// Drop the snapshot on stage completion or failure
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        self.current.as_ref()
    }
}
