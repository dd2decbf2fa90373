//! Benchmark report assembled from a finished pipeline session

use crate::client::RetrievedChunk;
use crate::metrics::{GenerationMetrics, Metrics, RetrievalMetrics};
use crate::pipeline::{GenerationPath, GenerationResult, PipelineState, StageTiming};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Source reference for one retrieved chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub page: i64,
    pub score: f64,
}

impl From<&RetrievedChunk> for SourceRef {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            source: chunk.source.clone(),
            page: chunk.page,
            score: chunk.score,
        }
    }
}

/// Outcome of one retrieve + generate round
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub answer: Option<String>,
    pub path: Option<GenerationPath>,
    pub sources: Vec<SourceRef>,
    pub retrieval: Option<RetrievalMetrics>,
    pub generation: Option<GenerationMetrics>,
    pub error: Option<String>,
}

impl QueryReport {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: None,
            path: None,
            sources: Vec::new(),
            retrieval: None,
            generation: None,
            error: None,
        }
    }

    pub fn with_retrieval(
        mut self,
        chunks: &[RetrievedChunk],
        metrics: Option<&RetrievalMetrics>,
    ) -> Self {
        self.sources = chunks.iter().map(SourceRef::from).collect();
        self.retrieval = metrics.cloned();
        self
    }

    pub fn with_generation(mut self, result: &GenerationResult) -> Self {
        self.answer = Some(result.answer.clone());
        self.path = Some(result.path);
        self.generation = Some(result.metrics.clone());
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Full session report
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub generated_at: DateTime<Utc>,
    pub service_url: String,
    pub document: Option<String>,
    pub chunks_count: Option<usize>,
    /// Latest metrics, as merged by the controller
    pub metrics: Metrics,
    /// Sum of reported stage times
    pub total_time: Option<f64>,
    /// Wall-clock time per operation, measured client side
    pub timings: Vec<StageTiming>,
    pub queries: Vec<QueryReport>,
}

impl PipelineReport {
    pub fn from_state(
        service_url: impl Into<String>,
        state: &PipelineState,
        queries: Vec<QueryReport>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            service_url: service_url.into(),
            document: state.filename.clone(),
            chunks_count: state.chunks_count,
            metrics: state.metrics.clone(),
            total_time: state.metrics.total_time(),
            timings: state.timings.clone(),
            queries,
        }
    }

    /// Wall-clock seconds across all recorded operations
    pub fn wall_time(&self) -> f64 {
        self.timings.iter().map(|t| t.seconds).sum()
    }

    pub fn failed_queries(&self) -> usize {
        self.queries.iter().filter(|q| q.error.is_some()).count()
    }
}
