//! Remote RAG service client
//!
//! One operation per pipeline stage. Operations return their result together
//! with the stage's metrics fragment and never retry.

mod http;

pub use http::{HttpStageClient, RequestStats};

use crate::error::Result;
use crate::metrics::{
    EmbeddingMetrics, GenerationMetrics, IngestionMetrics, MetricsFragment, RetrievalMetrics,
};
use crate::stream::EventStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Separator placed between retrieved chunk texts in the generation context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Stage operations offered by the remote service
#[async_trait]
pub trait StageClient: Send + Sync {
    /// List available models, partitioned by capability
    async fn list_models(&self) -> Result<ModelCatalog>;

    /// Clear remote session state
    async fn reset(&self) -> Result<()>;

    /// Upload a document
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt>;

    /// Extract and chunk a previously uploaded document
    async fn process(&self, filename: &str, chunking_model: &str) -> Result<ProcessOutcome>;

    /// Embed all chunks that have no vector yet
    async fn embed(&self, embedding_model: &str) -> Result<EmbedOutcome>;

    /// Vector search followed by rerank
    async fn retrieve(&self, request: &RetrieveRequest) -> Result<RetrieveOutcome>;

    /// Blocking generation, returns the complete answer
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateOutcome>;

    /// Streamed generation
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<EventStream>;
}

/// Models known to the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub all: Vec<String>,
    pub embedding: Vec<String>,
    pub generation: Vec<String>,
}

impl ModelCatalog {
    /// Partition plain model names: anything mentioning "embedding" embeds
    pub fn from_names(names: Vec<String>) -> Self {
        let (embedding, generation): (Vec<String>, Vec<String>) = names
            .iter()
            .cloned()
            .partition(|name| name.to_lowercase().contains("embedding"));
        Self {
            all: names,
            embedding,
            generation,
        }
    }
}

/// Acknowledgement of an upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest<'a> {
    pub filename: &'a str,
    pub chunking_model: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub chunks_count: usize,
    #[serde(default)]
    pub pages_processed: Option<usize>,
    #[serde(default)]
    pub metrics: IngestionMetrics,
}

impl ProcessOutcome {
    pub fn fragment(&self) -> MetricsFragment {
        MetricsFragment::Ingestion(self.metrics.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedRequest<'a> {
    pub embedding_model: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedOutcome {
    /// `success` or `no_updates_needed`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    /// Absent when nothing needed embedding; treated as zero time
    #[serde(default)]
    pub metrics: EmbeddingMetrics,
}

impl EmbedOutcome {
    pub fn fragment(&self) -> MetricsFragment {
        MetricsFragment::Embedding(self.metrics.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrieveRequest {
    pub query: String,
    pub embedding_model: String,
    pub reranker_model: String,
    pub top_k: usize,
}

/// One reranked chunk, best first in a result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveOutcome {
    #[serde(default)]
    pub results: Vec<RetrievedChunk>,
    #[serde(default)]
    pub metrics: RetrievalMetrics,
}

impl RetrieveOutcome {
    pub fn fragment(&self) -> MetricsFragment {
        MetricsFragment::Retrieval(self.metrics.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub query: String,
    pub context: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOutcome {
    pub answer: String,
    #[serde(default)]
    pub metrics: GenerationMetrics,
}

impl GenerateOutcome {
    pub fn fragment(&self) -> MetricsFragment {
        MetricsFragment::Generation(self.metrics.clone())
    }
}

/// Join chunk texts in rank order to form the generation context
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
