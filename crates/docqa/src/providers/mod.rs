//! Provider abstractions for embeddings and LLM completion
//!
//! Trait-based so the pipeline can run against a local Ollama server or
//! Vertex AI (`gcp` feature). Every call is wrapped by [`RetryPolicy`].

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod retry;

#[cfg(feature = "gcp")]
pub mod gcp;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{ollama_pair, OllamaClient, OllamaEmbedder, OllamaLlm};
pub use retry::RetryPolicy;
