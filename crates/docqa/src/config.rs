//! Configuration for the document QA pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ingestion::TextCleaning;
use crate::retrieval::SimilarityMetric;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocQaConfig {
    /// Backend provider (local or gcp)
    pub backend: BackendProvider,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Ollama configuration
    pub llm: LlmConfig,
    /// Retry policy for every external call
    pub retry: RetryConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Prompt and answer configuration
    pub generation: GenerationConfig,
    /// Input enumeration
    pub extraction: ExtractionConfig,
    /// GCP configuration (required when backend = gcp)
    pub gcp: Option<GcpConfig>,
}

impl DocQaConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, the per-user default location, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        if let Some(default_path) = Self::default_path().filter(|p| p.is_file()) {
            tracing::info!("Using configuration at {}", default_path.display());
            return Self::from_file(default_path);
        }

        Ok(Self::default())
    }

    /// `<config dir>/docqa/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("docqa").join("config.toml"))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be positive".into()));
        }
        if self.embeddings.dimensions == Some(0) {
            return Err(Error::Config("embeddings.dimensions must be positive".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(Error::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }
        if self.backend == BackendProvider::Gcp && self.gcp.is_none() {
            return Err(Error::Config("backend = \"gcp\" requires a [gcp] section".into()));
        }
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Cleaning applied to unit content before chunking
    pub cleaning: TextCleaning,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            cleaning: TextCleaning::Alphanumeric,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Expected vector dimension; inferred from the first vector when unset
    pub dimensions: Option<usize>,
    /// Texts per embedding call
    pub batch_size: usize,
    /// Concurrent embedding calls while building the index
    pub concurrency: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: None,
            batch_size: 1,
            concurrency: None, // Auto-detect from CPU count
        }
    }
}

impl EmbeddingConfig {
    /// Worker limit for embedding calls
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// HTTP client timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts in total, including the first one
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub initial_backoff_ms: u64,
    /// Upper bound for any single backoff
    pub max_backoff_ms: u64,
    /// Randomize each backoff between the initial value and its cap
    pub jitter: bool,
    /// Per-attempt timeout in seconds (0 disables it)
    pub call_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 20_000,
            jitter: true,
            call_timeout_secs: 120,
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks selected per question
    pub top_k: usize,
    /// Ranking metric
    pub metric: SimilarityMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// Prompt and answer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Answer the model must give when the context has no answer,
    /// also recorded for rows whose generation failed
    pub not_found_marker: String,
    /// Drop lowest-ranked chunks until the context fits
    pub max_context_chars: Option<usize>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            not_found_marker: "NULL".to_string(),
            max_context_chars: None,
        }
    }
}

/// Input enumeration configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Descend into subdirectories
    pub recursive: bool,
}

/// Backend provider selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Local Ollama server
    #[default]
    Local,
    /// Google Cloud Platform (Vertex AI)
    Gcp,
}

/// Google Cloud Platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Path to service account JSON key file
    pub service_account_key_path: PathBuf,
    /// GCP project ID
    pub project_id: String,
    /// GCP region (e.g., "us-central1")
    pub location: String,
    /// Embedding model (default: "text-embedding-005")
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Generation model (default: "gemini-1.5-flash")
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Sampling temperature
    #[serde(default = "default_gcp_temperature")]
    pub temperature: f32,
    /// Output token cap
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_embedding_model() -> String {
    "text-embedding-005".to_string()
}

fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gcp_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> u32 {
    1024
}
