//! Pipeline orchestration
//!
//! [`PipelineController`] is the single writer of pipeline state. It runs one
//! stage operation at a time, merges each operation's metrics fragment and
//! publishes a fresh [`PipelineState`] snapshot after every change.

mod state;

pub use state::{Operation, PipelineState, Stage, StageFailure, StageState, StageTiming};

use crate::client::{
    build_context, GenerateRequest, ModelCatalog, RetrieveRequest, RetrievedChunk, StageClient,
    UploadReceipt,
};
use crate::config::{require_model, Config, ModelSelection};
use crate::error::{RagPipeError, Result};
use crate::metrics::{GenerationMetrics, MetricsFragment};
use crate::progress::ProgressTracker;
use crate::stream::StreamEvent;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Result of the combined process + embed action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub chunks_count: usize,
    pub pages_processed: Option<usize>,
    pub embedded: Option<usize>,
}

/// Which path produced a generated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPath {
    /// Streamed to completion
    Streamed,
    /// Stream failed, blocking request succeeded
    Fallback,
    /// Streaming disabled
    Blocking,
}

/// A completed generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub answer: String,
    pub metrics: GenerationMetrics,
    pub path: GenerationPath,
}

/// Drives the stage state machine against a [`StageClient`]
pub struct PipelineController {
    client: Arc<dyn StageClient>,
    models: ModelSelection,
    top_k: usize,
    streaming: bool,
    state: PipelineState,
    progress: ProgressTracker,
    notifier: watch::Sender<PipelineState>,
}

impl PipelineController {
    pub fn new(client: Arc<dyn StageClient>, config: &Config) -> Self {
        let state = PipelineState::default();
        let (notifier, _) = watch::channel(state.clone());
        Self {
            client,
            models: config.models.clone(),
            top_k: config.retrieval.top_k.max(1),
            streaming: config.generation.streaming,
            state,
            progress: ProgressTracker::new(),
            notifier,
        }
    }

    /// Current state (read-only)
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage.stage()
    }

    /// Receive a snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.notifier.subscribe()
    }

    pub fn models(&self) -> &ModelSelection {
        &self.models
    }

    /// Replace the model selection; read at the next stage call
    pub fn set_models(&mut self, models: ModelSelection) {
        self.models = models;
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Clear remote state and seed unset models from the service catalog.
    ///
    /// Reset failures are logged only. A catalog failure leaves the configured
    /// models untouched and returns `None`.
    pub async fn start_session(&mut self) -> Result<Option<ModelCatalog>> {
        let started = self.begin(Operation::Reset, "Resetting session", 1)?;

        if let Err(e) = self.client.reset().await {
            tracing::warn!("Failed to reset remote state: {}", e);
        }
        self.state.reset_session();
        self.state.stage.clear();

        let catalog = match self.client.list_models().await {
            Ok(catalog) => {
                tracing::info!(
                    "Service offers {} models ({} embedding, {} generation)",
                    catalog.all.len(),
                    catalog.embedding.len(),
                    catalog.generation.len()
                );
                self.models.seed_from_catalog(&catalog);
                Some(catalog)
            }
            Err(e) => {
                tracing::warn!("Failed to list models, keeping configured ones: {}", e);
                None
            }
        };

        self.finish(Operation::Reset, started, Ok(catalog))
    }

    /// Upload a document, starting a new session on success
    pub async fn upload(&mut self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt> {
        if filename.trim().is_empty() {
            return Err(RagPipeError::InvalidInput("Filename is empty".to_string()));
        }
        let started = self.begin(Operation::Upload, "Uploading document", 1)?;

        let result = self.client.upload(filename, bytes).await;
        if let Ok(ref receipt) = result {
            self.state.reset_session();
            self.state.filename = Some(receipt.filename.clone());
            self.state.stage.restart();
            tracing::info!("Uploaded {}", receipt.filename);
        }

        self.finish(Operation::Upload, started, result)
    }

    /// Chunk then embed the uploaded document
    pub async fn ingest(&mut self) -> Result<IngestSummary> {
        let started = self.begin(Operation::Ingest, "Chunking document", 2)?;
        let result = self.run_ingest().await;
        self.finish(Operation::Ingest, started, result)
    }

    async fn run_ingest(&mut self) -> Result<IngestSummary> {
        let filename = self
            .state
            .filename
            .clone()
            .ok_or_else(|| RagPipeError::InvalidInput("No document uploaded".to_string()))?;
        let chunking_model =
            require_model("chunking_model", &self.models.chunking_model)?.to_string();
        let embedding_model =
            require_model("embedding_model", &self.models.embedding_model)?.to_string();

        let processed = self.client.process(&filename, &chunking_model).await?;
        tracing::info!(
            "Processed {} into {} chunks in {:.2}s",
            filename,
            processed.chunks_count,
            processed.metrics.total_time
        );
        self.state.chunks_count = Some(processed.chunks_count);
        self.state.metrics.merge(processed.fragment());
        self.progress.update("Generating embeddings", 1, 2);
        self.publish();

        let embedded = self.client.embed(&embedding_model).await?;
        self.state.metrics.merge(embedded.fragment());
        self.state.stage.advance_to(Stage::Retrieve);

        Ok(IngestSummary {
            chunks_count: processed.chunks_count,
            pages_processed: processed.pages_processed,
            embedded: embedded.count,
        })
    }

    /// Search and rerank; may be repeated with new queries
    pub async fn retrieve(&mut self, query: &str) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(RagPipeError::InvalidInput("Query is empty".to_string()));
        }
        let started = self.begin(Operation::Retrieve, "Retrieving context", 1)?;
        let result = self.run_retrieve(query).await;
        self.finish(Operation::Retrieve, started, result)
    }

    async fn run_retrieve(&mut self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let request = RetrieveRequest {
            query: query.to_string(),
            embedding_model: require_model("embedding_model", &self.models.embedding_model)?
                .to_string(),
            reranker_model: require_model("reranker_model", &self.models.reranker_model)?
                .to_string(),
            top_k: self.top_k,
        };

        let outcome = self.client.retrieve(&request).await?;
        tracing::info!(
            "Retrieved {} chunks in {:.2}s",
            outcome.results.len(),
            outcome.metrics.total_time
        );
        self.state.metrics.merge(outcome.fragment());
        self.state.chunks = outcome.results.clone();
        self.state.stage.advance_to(Stage::Generate);

        Ok(outcome.results)
    }

    /// Generate an answer from the retrieved chunks.
    ///
    /// Streams when enabled. If the stream cannot be completed the partial
    /// answer is discarded and the blocking endpoint is tried exactly once.
    pub async fn generate(&mut self, query: &str) -> Result<GenerationResult> {
        if query.trim().is_empty() {
            return Err(RagPipeError::InvalidInput("Query is empty".to_string()));
        }
        let started = self.begin(Operation::Generate, "Generating answer", 0)?;
        let result = self.run_generate(query).await;
        self.state.streaming = false;
        self.finish(Operation::Generate, started, result)
    }

    async fn run_generate(&mut self, query: &str) -> Result<GenerationResult> {
        let request = GenerateRequest {
            query: query.to_string(),
            context: build_context(&self.state.chunks),
            model: require_model("generation_model", &self.models.generation_model)?.to_string(),
        };

        self.state.answer.clear();
        self.state.tokens_per_sec = None;

        let path = if self.streaming {
            self.state.streaming = true;
            self.publish();

            match self.drain_stream(&request).await {
                Ok(metrics) => {
                    self.state
                        .metrics
                        .merge(MetricsFragment::Generation(metrics.clone()));
                    return Ok(GenerationResult {
                        answer: self.state.answer.clone(),
                        metrics,
                        path: GenerationPath::Streamed,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Streaming generation failed ({}), retrying without streaming",
                        e
                    );
                    self.state.streaming = false;
                    self.state.answer.clear();
                    self.state.tokens_per_sec = None;
                    self.publish();
                    GenerationPath::Fallback
                }
            }
        } else {
            GenerationPath::Blocking
        };

        let outcome = self.client.generate(&request).await?;
        self.state.answer = outcome.answer.clone();
        self.state.metrics.merge(outcome.fragment());

        Ok(GenerationResult {
            answer: outcome.answer,
            metrics: outcome.metrics,
            path,
        })
    }

    /// Apply stream events until the terminal one; its metrics are returned
    async fn drain_stream(&mut self, request: &GenerateRequest) -> Result<GenerationMetrics> {
        let mut events = self.client.generate_stream(request).await?;

        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Content(text) => {
                    self.state.answer.push_str(&text);
                    self.progress.increment();
                    self.publish();
                }
                StreamEvent::Throughput(rate) => {
                    self.state.tokens_per_sec = Some(rate);
                    self.publish();
                }
                StreamEvent::Done(metrics) => return Ok(metrics),
            }
        }

        Err(RagPipeError::StreamIncomplete)
    }

    fn begin(&mut self, op: Operation, label: &str, total: u64) -> Result<Instant> {
        self.state.stage.begin(op)?;
        self.state.last_error = None;
        self.progress.begin(label, total);
        tracing::debug!("Starting {}", op);
        self.publish();
        Ok(Instant::now())
    }

    fn finish<T>(&mut self, op: Operation, started: Instant, result: Result<T>) -> Result<T> {
        self.state.stage.finish();
        self.progress.clear();
        match result {
            Ok(_) => self.state.timings.push(StageTiming {
                operation: op,
                seconds: started.elapsed().as_secs_f64(),
            }),
            Err(ref e) => {
                tracing::warn!("{} failed: {}", op, e);
                self.state.last_error = Some(StageFailure {
                    operation: op,
                    message: e.to_string(),
                });
            }
        }
        self.publish();
        result
    }

    fn publish(&mut self) {
        self.state.progress = self.progress.snapshot().cloned();
        self.notifier.send_replace(self.state.clone());
    }
}
