//! HTTP client for the remote RAG service

use super::{
    EmbedOutcome, EmbedRequest, GenerateOutcome, GenerateRequest, ModelCatalog, ProcessOutcome,
    ProcessRequest, RetrieveOutcome, RetrieveRequest, StageClient, UploadReceipt,
};
use crate::config::ServiceConfig;
use crate::error::{RagPipeError, Result};
use crate::stream::{decode_events, EventStream};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Request counters for the service connection
#[derive(Debug, Default)]
struct RequestCounters {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Snapshot of request counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStats {
    pub total_requests: u64,
    pub total_errors: u64,
    pub avg_latency_ms: f64,
}

/// reqwest-backed [`StageClient`]
pub struct HttpStageClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
    counters: Arc<RequestCounters>,
}

#[derive(Deserialize)]
struct ModelEntry {
    #[serde(alias = "name")]
    model: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    embedding_models: Option<Vec<ModelEntry>>,
    #[serde(default)]
    generation_models: Option<Vec<ModelEntry>>,
}

fn names(entries: Vec<ModelEntry>) -> Vec<String> {
    entries.into_iter().map(|m| m.model).collect()
}

impl HttpStageClient {
    /// Create a client from service configuration
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        // Per-read bound; a stalled stream errors out instead of hanging
        if let Some(timeout) = config.timeout() {
            builder = builder.read_timeout(timeout);
        }
        let http_client = builder.build().map_err(RagPipeError::Http)?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            counters: Arc::new(RequestCounters::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get current request counters
    pub fn stats(&self) -> RequestStats {
        let total = self.counters.total_requests.load(Ordering::Relaxed);
        RequestStats {
            total_requests: total,
            total_errors: self.counters.total_errors.load(Ordering::Relaxed),
            avg_latency_ms: if total > 0 {
                self.counters.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_timeout(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        }
    }

    /// Send a request and fail on transport errors or non-2xx status
    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let start = Instant::now();
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        let response = req.send().await.map_err(|e| {
            self.counters.total_errors.fetch_add(1, Ordering::Relaxed);
            RagPipeError::Http(e)
        })?;

        let elapsed = start.elapsed().as_millis() as u64;
        self.counters
            .total_latency_ms
            .fetch_add(elapsed, Ordering::Relaxed);

        if !response.status().is_success() {
            self.counters.total_errors.fetch_add(1, Ordering::Relaxed);
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagPipeError::ExternalError(format!(
                "{} failed (HTTP {}): {}",
                what, status, body
            )));
        }

        Ok(response)
    }

    async fn read_json<R: DeserializeOwned>(&self, response: reqwest::Response) -> Result<R> {
        response.json().await.map_err(|e| {
            self.counters.total_errors.fetch_add(1, Ordering::Relaxed);
            RagPipeError::Http(e)
        })
    }

    async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<R> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);
        let req = self.with_timeout(self.http_client.post(&url).json(body));
        let response = self.send(req, what).await?;
        self.read_json(response).await
    }
}

#[async_trait]
impl StageClient for HttpStageClient {
    async fn list_models(&self) -> Result<ModelCatalog> {
        let url = self.url("/models");
        tracing::debug!("GET {}", url);
        let req = self.with_timeout(self.http_client.get(&url));
        let response = self.send(req, "Model listing").await?;
        let parsed: ModelsResponse = self.read_json(response).await?;

        let all = names(parsed.models);
        let catalog = match (parsed.embedding_models, parsed.generation_models) {
            (Some(embedding), Some(generation)) => ModelCatalog {
                all,
                embedding: names(embedding),
                generation: names(generation),
            },
            _ => ModelCatalog::from_names(all),
        };
        Ok(catalog)
    }

    async fn reset(&self) -> Result<()> {
        let url = self.url("/reset");
        tracing::debug!("POST {}", url);
        let req = self.with_timeout(self.http_client.post(&url));
        self.send(req, "Reset").await?;
        Ok(())
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt> {
        let url = self.url("/upload");
        tracing::debug!("POST {} ({} bytes)", url, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let req = self.with_timeout(self.http_client.post(&url).multipart(form));
        let response = self.send(req, "Upload").await?;

        // Only the status matters; tolerate an empty or unexpected body
        let body = response.text().await.map_err(RagPipeError::Http)?;
        let mut receipt: UploadReceipt = serde_json::from_str(&body).unwrap_or_default();
        if receipt.filename.is_empty() {
            receipt.filename = filename.to_string();
        }
        Ok(receipt)
    }

    async fn process(&self, filename: &str, chunking_model: &str) -> Result<ProcessOutcome> {
        let request = ProcessRequest {
            filename,
            chunking_model,
        };
        self.post_json("/process", &request, "Processing").await
    }

    async fn embed(&self, embedding_model: &str) -> Result<EmbedOutcome> {
        let request = EmbedRequest { embedding_model };
        self.post_json("/embed", &request, "Embedding").await
    }

    async fn retrieve(&self, request: &RetrieveRequest) -> Result<RetrieveOutcome> {
        self.post_json("/retrieve", request, "Retrieval").await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateOutcome> {
        self.post_json("/generate", request, "Generation").await
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<EventStream> {
        let url = self.url("/generate/stream");
        tracing::debug!("POST {} (stream)", url);

        // No whole-request timeout, a healthy stream may run for minutes
        let req = self
            .http_client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request);
        let response = self.send(req, "Streaming generation").await?;

        Ok(decode_events(response.bytes_stream()))
    }
}
