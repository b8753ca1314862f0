//! Google Cloud Platform providers
//!
//! - Vertex AI text-embedding-005 for embeddings
//! - Gemini for answer generation

mod auth;
mod gemini_client;
mod vertex_embedder;

use std::sync::Arc;

use crate::config::GcpConfig;
use crate::error::Result;

pub use auth::GcpAuth;
pub use gemini_client::GeminiClient;
pub use vertex_embedder::VertexAiEmbedder;

/// Embedder and Gemini client sharing one service-account session
pub fn vertex_pair(
    config: &GcpConfig,
    dimensions: Option<usize>,
) -> Result<(VertexAiEmbedder, GeminiClient)> {
    let auth = Arc::new(GcpAuth::from_service_account(
        &config.service_account_key_path,
        config.project_id.clone(),
    )?);

    Ok((
        VertexAiEmbedder::new(
            Arc::clone(&auth),
            config.location.clone(),
            config.embedding_model.clone(),
            dimensions,
        ),
        GeminiClient::new(
            auth,
            config.location.clone(),
            config.generation_model.clone(),
            config.temperature,
            config.max_output_tokens,
        ),
    ))
}
