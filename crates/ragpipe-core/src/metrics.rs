//! Per-stage timing and throughput aggregation
//!
//! Each stage operation returns a [`MetricsFragment`]. The controller merges
//! fragments into a [`Metrics`] value, which only ever gains keys during a
//! document session. `None` means the stage has not completed yet and is
//! distinct from a stage that finished in zero seconds.

use serde::{Deserialize, Serialize};

/// Timings reported by the process (chunking) stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionMetrics {
    #[serde(default)]
    pub total_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_insertion_time: Option<f64>,
}

/// Timings reported by the embed stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetrics {
    #[serde(default)]
    pub total_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_update_time: Option<f64>,
}

/// Timings reported by the retrieve (search + rerank) stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    #[serde(default)]
    pub total_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranking_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_time: Option<f64>,
}

/// Timing and throughput reported by either generation path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    #[serde(default)]
    pub generation_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_per_sec: Option<f64>,
}

/// Partial result of one stage, merged into [`Metrics`]
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsFragment {
    Ingestion(IngestionMetrics),
    Embedding(EmbeddingMetrics),
    Retrieval(RetrievalMetrics),
    Generation(GenerationMetrics),
}

impl MetricsFragment {
    /// Key under which this fragment is stored
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ingestion(_) => "ingestion",
            Self::Embedding(_) => "embedding",
            Self::Retrieval(_) => "retrieval",
            Self::Generation(_) => "generation",
        }
    }
}

/// Aggregated pipeline metrics for one document session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion: Option<IngestionMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationMetrics>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fragment, touching only the fragment's own key.
    ///
    /// A repeated stage (new retrieval or generation query) replaces its own
    /// earlier entry; every other key is left as it was.
    pub fn merge(&mut self, fragment: MetricsFragment) {
        match fragment {
            MetricsFragment::Ingestion(mut m) => {
                m.total_time = non_negative(m.total_time);
                self.ingestion = Some(m);
            }
            MetricsFragment::Embedding(mut m) => {
                m.total_time = non_negative(m.total_time);
                self.embedding = Some(m);
            }
            MetricsFragment::Retrieval(mut m) => {
                m.total_time = non_negative(m.total_time);
                self.retrieval = Some(m);
            }
            MetricsFragment::Generation(mut m) => {
                m.generation_time = non_negative(m.generation_time);
                self.generation = Some(m);
            }
        }
    }

    /// Builder-style merge
    pub fn merged(mut self, fragment: MetricsFragment) -> Self {
        self.merge(fragment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ingestion.is_none()
            && self.embedding.is_none()
            && self.retrieval.is_none()
            && self.generation.is_none()
    }

    /// Per-stage latency in pipeline order; `None` for stages not yet run
    pub fn stage_times(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("ingestion", self.ingestion.as_ref().map(|m| m.total_time)),
            ("embedding", self.embedding.as_ref().map(|m| m.total_time)),
            ("retrieval", self.retrieval.as_ref().map(|m| m.total_time)),
            (
                "generation",
                self.generation.as_ref().map(|m| m.generation_time),
            ),
        ]
    }

    /// Sum of the stage times that have been recorded
    pub fn total_time(&self) -> Option<f64> {
        let times: Vec<f64> = self.stage_times().iter().filter_map(|(_, t)| *t).collect();
        if times.is_empty() {
            None
        } else {
            Some(times.iter().sum())
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
