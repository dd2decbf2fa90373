//! Configuration management

use crate::client::ModelCatalog;
use crate::error::{RagPipeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote RAG service
    #[serde(default)]
    pub service: ServiceConfig,

    /// Models used by each stage
    #[serde(default)]
    pub models: ModelSelection,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the RAG service
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-request timeout in seconds for non-streaming calls.
    /// Unset means requests may block indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: None,
        }
    }
}

fn default_url() -> String {
    "http://localhost:8000".to_string()
}

/// Remote model identifiers, one per stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    #[serde(default = "default_chunking_model")]
    pub chunking_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_reranker_model")]
    pub reranker_model: String,

    #[serde(default = "default_generation_model")]
    pub generation_model: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            chunking_model: default_chunking_model(),
            embedding_model: default_embedding_model(),
            reranker_model: default_reranker_model(),
            generation_model: default_generation_model(),
        }
    }
}

impl ModelSelection {
    /// Fill empty entries from the service's model catalog.
    ///
    /// Entries the user already chose are left alone.
    pub fn seed_from_catalog(&mut self, catalog: &ModelCatalog) {
        if self.embedding_model.is_empty() {
            if let Some(name) = catalog.embedding.first() {
                self.embedding_model = name.clone();
            }
        }
        if self.generation_model.is_empty() {
            if let Some(name) = catalog.generation.first() {
                self.generation_model = name.clone();
            }
        }
        if self.chunking_model.is_empty() {
            if let Some(name) = catalog.generation.first() {
                self.chunking_model = name.clone();
            }
        }
    }

    /// Get a model identifier by its config key
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "chunking_model" => Some(&self.chunking_model),
            "embedding_model" => Some(&self.embedding_model),
            "reranker_model" => Some(&self.reranker_model),
            "generation_model" => Some(&self.generation_model),
            _ => None,
        }
    }
}

/// Check that a model identifier is usable before a stage sends it
pub fn require_model<'a>(key: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(RagPipeError::Config(format!("{} is not set", key)));
    }
    Ok(value)
}

fn default_chunking_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_embedding_model() -> String {
    "qwen3-embedding:4b".to_string()
}

fn default_reranker_model() -> String {
    "BAAI/bge-reranker-v2-m3".to_string()
}

/// Empty until seeded from the service catalog
fn default_generation_model() -> String {
    String::new()
}

/// Environment variables that override config values, by dotted key
pub const ENV_OVERRIDES: [(&str, &str); 6] = [
    ("RAGPIPE_URL", "service.url"),
    ("RAGPIPE_TIMEOUT_SECS", "service.timeout_secs"),
    ("RAGPIPE_CHUNKING_MODEL", "models.chunking_model"),
    ("RAGPIPE_EMBEDDING_MODEL", "models.embedding_model"),
    ("RAGPIPE_RERANKER_MODEL", "models.reranker_model"),
    ("RAGPIPE_GENERATION_MODEL", "models.generation_model"),
];

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of reranked chunks to request
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// Generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Use the SSE endpoint (falls back to the blocking one on failure)
    #[serde(default = "default_streaming")]
    pub streaming: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            streaming: default_streaming(),
        }
    }
}

fn default_streaming() -> bool {
    true
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from a file, then apply `RAGPIPE_*` environment overrides
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let mut config = Self::read_from(path)?;
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Stored values only, falling back to defaults if the file is missing.
    /// Use this when the result is saved back.
    pub fn read_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path (RAGPIPE_CONFIG overrides)
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("RAGPIPE_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Apply [`ENV_OVERRIDES`] for every variable `lookup` resolves
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(name) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    /// Set a value by dotted key, e.g. `models.generation_model`
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "service.url" => self.service.url = value.to_string(),
            "service.timeout_secs" => {
                self.service.timeout_secs = if value.is_empty() || value == "none" {
                    None
                } else {
                    Some(parse_value(key, value)?)
                }
            }
            "models.chunking_model" => self.models.chunking_model = value.to_string(),
            "models.embedding_model" => self.models.embedding_model = value.to_string(),
            "models.reranker_model" => self.models.reranker_model = value.to_string(),
            "models.generation_model" => self.models.generation_model = value.to_string(),
            "retrieval.top_k" => {
                let top_k: usize = parse_value(key, value)?;
                if top_k == 0 {
                    return Err(RagPipeError::Config(
                        "retrieval.top_k must be at least 1".to_string(),
                    ));
                }
                self.retrieval.top_k = top_k;
            }
            "generation.streaming" => self.generation.streaming = parse_value(key, value)?,
            _ => return Err(RagPipeError::Config(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| RagPipeError::Config(format!("Invalid value for {}: {}", key, value)))
}
