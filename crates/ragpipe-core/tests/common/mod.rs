//! Scripted in-memory stage client shared by the pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ragpipe_core::client::{EmbedOutcome, ProcessOutcome};
use ragpipe_core::{
    Config, EmbeddingMetrics, EventStream, GenerateOutcome, GenerateRequest, GenerationMetrics,
    IngestionMetrics, ModelCatalog, RagPipeError, Result, RetrievalMetrics, RetrieveOutcome,
    RetrieveRequest, RetrievedChunk, StageClient, StreamEvent, UploadReceipt,
};
use std::collections::HashSet;
use std::sync::Mutex;

/// How the fake service behaves on `/generate/stream`
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Deliver these events, then end normally
    Events(Vec<StreamEvent>),
    /// Deliver these events, then fail with a transport error
    DropAfter(Vec<StreamEvent>),
    /// The request itself fails
    Refuse,
}

pub struct FakeClient {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    stream: Mutex<StreamScript>,
    blocking_answer: Mutex<GenerateOutcome>,
    chunks: Vec<RetrievedChunk>,
    generate_requests: Mutex<Vec<GenerateRequest>>,
    retrieve_requests: Mutex<Vec<RetrieveRequest>>,
}

pub fn ranked_chunks(n: usize) -> Vec<RetrievedChunk> {
    (0..n)
        .map(|i| RetrievedChunk {
            text: format!("chunk {}", i),
            source: "guide.pdf".to_string(),
            page: i as i64 + 1,
            score: 1.0 - i as f64 * 0.1,
        })
        .collect()
}

/// Events of the happy-path stream: "Hi" + " there", one sample, done
pub fn hi_there_events() -> Vec<StreamEvent> {
    vec![
        StreamEvent::Content("Hi".to_string()),
        StreamEvent::Content(" there".to_string()),
        StreamEvent::Throughput(42.0),
        StreamEvent::Done(GenerationMetrics {
            generation_time: 2.1,
            token_count: Some(8),
            tokens_per_sec: Some(40.5),
        }),
    ]
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            stream: Mutex::new(StreamScript::Events(hi_there_events())),
            blocking_answer: Mutex::new(GenerateOutcome {
                answer: "Full answer.".to_string(),
                metrics: GenerationMetrics {
                    generation_time: 3.0,
                    token_count: None,
                    tokens_per_sec: None,
                },
            }),
            chunks: ranked_chunks(5),
            generate_requests: Mutex::new(Vec::new()),
            retrieve_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_stream(&self, script: StreamScript) {
        *self.stream.lock().unwrap() = script;
    }

    /// Make an operation fail with a transport-style error
    pub fn fail(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    pub fn heal(&self, op: &str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.generate_requests.lock().unwrap().clone()
    }

    pub fn retrieve_requests(&self) -> Vec<RetrieveRequest> {
        self.retrieve_requests.lock().unwrap().clone()
    }

    fn call(&self, op: &str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        if self.failing.lock().unwrap().contains(op) {
            return Err(RagPipeError::ExternalError(format!("{} unavailable", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl StageClient for FakeClient {
    async fn list_models(&self) -> Result<ModelCatalog> {
        self.call("models")?;
        Ok(ModelCatalog::from_names(vec![
            "qwen3-embedding:4b".to_string(),
            "llama3.1:8b".to_string(),
        ]))
    }

    async fn reset(&self) -> Result<()> {
        self.call("reset")
    }

    async fn upload(&self, filename: &str, _bytes: Vec<u8>) -> Result<UploadReceipt> {
        self.call("upload")?;
        Ok(UploadReceipt {
            filename: filename.to_string(),
            path: Some(format!("data/uploads/{}", filename)),
        })
    }

    async fn process(&self, _filename: &str, _chunking_model: &str) -> Result<ProcessOutcome> {
        self.call("process")?;
        Ok(ProcessOutcome {
            chunks_count: 12,
            pages_processed: Some(3),
            metrics: IngestionMetrics {
                total_time: 1.5,
                ..Default::default()
            },
        })
    }

    async fn embed(&self, _embedding_model: &str) -> Result<EmbedOutcome> {
        self.call("embed")?;
        Ok(EmbedOutcome {
            status: Some("success".to_string()),
            count: Some(12),
            metrics: EmbeddingMetrics {
                total_time: 0.8,
                ..Default::default()
            },
        })
    }

    async fn retrieve(&self, request: &RetrieveRequest) -> Result<RetrieveOutcome> {
        self.call("retrieve")?;
        self.retrieve_requests.lock().unwrap().push(request.clone());
        Ok(RetrieveOutcome {
            results: self.chunks.clone(),
            metrics: RetrievalMetrics {
                total_time: 0.4,
                reranking_time: Some(0.3),
                ..Default::default()
            },
        })
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateOutcome> {
        self.call("generate")?;
        self.generate_requests.lock().unwrap().push(request.clone());
        Ok(self.blocking_answer.lock().unwrap().clone())
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<EventStream> {
        self.call("generate_stream")?;
        self.generate_requests.lock().unwrap().push(request.clone());

        let script = self.stream.lock().unwrap().clone();
        let items: Vec<Result<StreamEvent>> = match script {
            StreamScript::Events(events) => events.into_iter().map(Ok).collect(),
            StreamScript::DropAfter(events) => {
                let mut items: Vec<Result<StreamEvent>> = events.into_iter().map(Ok).collect();
                items.push(Err(RagPipeError::ExternalError(
                    "connection closed".to_string(),
                )));
                items
            }
            StreamScript::Refuse => {
                return Err(RagPipeError::ExternalError("connection refused".to_string()))
            }
        };
        Ok(stream::iter(items).boxed())
    }
}

/// Config with every model set so no stage trips validation
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.models.chunking_model = "llama3.1:8b".to_string();
    config.models.embedding_model = "qwen3-embedding:4b".to_string();
    config.models.reranker_model = "BAAI/bge-reranker-v2-m3".to_string();
    config.models.generation_model = "llama3.1:8b".to_string();
    config.retrieval.top_k = 5;
    config.generation.streaming = true;
    config
}
