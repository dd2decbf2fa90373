//! ragpipe Core Library
//!
//! Drives a retrieval-augmented-generation pipeline hosted by a remote
//! service and measures each stage.
//!
//! # Features
//! - Stage state machine: upload, ingest (process + embed), retrieve, generate
//! - Incremental SSE decoding of streamed answers
//! - Single fallback from streamed to blocking generation
//! - Per-stage latency and token throughput metrics

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod stream;

pub use client::{
    build_context, GenerateOutcome, GenerateRequest, HttpStageClient, ModelCatalog,
    RequestStats, RetrieveOutcome, RetrieveRequest, RetrievedChunk, StageClient, UploadReceipt,
};
pub use config::{Config, ModelSelection, ServiceConfig};
pub use error::{RagPipeError, Error, Result};
pub use metrics::{
    EmbeddingMetrics, GenerationMetrics, IngestionMetrics, Metrics, MetricsFragment,
    RetrievalMetrics,
};
pub use pipeline::{
    GenerationPath, GenerationResult, IngestSummary, Operation, PipelineController,
    PipelineState, Stage, StageState,
};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use report::{PipelineReport, QueryReport};
pub use stream::{decode_events, EventStream, SseDecoder, StreamEvent};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "ragpipe";
