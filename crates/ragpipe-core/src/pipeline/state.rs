//! Stage state machine and observable pipeline state

use crate::client::RetrievedChunk;
use crate::error::{RagPipeError, Result};
use crate::metrics::Metrics;
use crate::progress::ProgressSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline progress, totally ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    Process,
    Retrieve,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upload => "upload",
            Self::Process => "process",
            Self::Retrieve => "retrieve",
            Self::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// User-triggered operations guarded by [`StageState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Reset,
    Upload,
    Ingest,
    Retrieve,
    Generate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reset => "reset",
            Self::Upload => "upload",
            Self::Ingest => "ingest",
            Self::Retrieve => "retrieve",
            Self::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// Current stage together with the operation in flight, if any.
///
/// Keeping both in one value means "busy" can never disagree with the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    stage: Stage,
    in_flight: Option<Operation>,
}

impl Default for StageState {
    fn default() -> Self {
        Self {
            stage: Stage::Upload,
            in_flight: None,
        }
    }
}

impl StageState {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn in_flight(&self) -> Option<Operation> {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether `op` may start from the current stage
    pub fn allows(&self, op: Operation) -> bool {
        match op {
            Operation::Reset | Operation::Upload => true,
            Operation::Ingest => self.stage == Stage::Process,
            Operation::Retrieve => self.stage >= Stage::Retrieve,
            Operation::Generate => self.stage == Stage::Generate,
        }
    }

    /// Operations that may start right now
    pub fn available(&self) -> Vec<Operation> {
        if self.is_busy() {
            return Vec::new();
        }
        [
            Operation::Upload,
            Operation::Ingest,
            Operation::Retrieve,
            Operation::Generate,
        ]
        .into_iter()
        .filter(|op| self.allows(*op))
        .collect()
    }

    /// Acquire the guard for `op`
    pub(crate) fn begin(&mut self, op: Operation) -> Result<()> {
        if let Some(current) = self.in_flight {
            return Err(RagPipeError::Busy(current));
        }
        if !self.allows(op) {
            return Err(RagPipeError::InvalidStage {
                operation: op,
                stage: self.stage,
            });
        }
        self.in_flight = Some(op);
        Ok(())
    }

    /// Release the guard, on success or failure
    pub(crate) fn finish(&mut self) {
        self.in_flight = None;
    }

    /// Move forward to `next`; never moves backwards
    pub(crate) fn advance_to(&mut self, next: Stage) {
        if next > self.stage {
            tracing::info!("Pipeline stage: {} -> {}", self.stage, next);
            self.stage = next;
        }
    }

    /// Start a new document session at Process
    pub(crate) fn restart(&mut self) {
        self.stage = Stage::Process;
    }

    /// Back to a fresh pipeline
    pub(crate) fn clear(&mut self) {
        self.stage = Stage::Upload;
    }
}

/// A stage-scoped failure, kept for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub operation: Operation,
    pub message: String,
}

/// Wall-clock duration of one operation as seen by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub operation: Operation,
    pub seconds: f64,
}

/// Everything an observer can see about the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    pub stage: StageState,
    pub filename: Option<String>,
    pub chunks_count: Option<usize>,
    pub chunks: Vec<RetrievedChunk>,
    pub answer: String,
    pub tokens_per_sec: Option<f64>,
    pub streaming: bool,
    pub metrics: Metrics,
    pub progress: Option<ProgressSnapshot>,
    pub last_error: Option<StageFailure>,
    pub timings: Vec<StageTiming>,
}

impl PipelineState {
    /// Drop all per-document data
    pub(crate) fn reset_session(&mut self) {
        self.filename = None;
        self.chunks_count = None;
        self.chunks.clear();
        self.answer.clear();
        self.tokens_per_sec = None;
        self.streaming = false;
        self.metrics = Metrics::new();
        self.timings.clear();
    }
}
