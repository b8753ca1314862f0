//! Vertex AI embedding provider using text-embedding-005

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::GcpAuth;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;

/// Instances accepted by one `:predict` request
const MAX_INSTANCES_PER_REQUEST: usize = 250;

/// Vertex AI embedding provider
pub struct VertexAiEmbedder {
    auth: Arc<GcpAuth>,
    model: String,
    location: String,
    dimensions: Option<usize>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    instances: Vec<EmbedInstance<'a>>,
}

#[derive(Serialize)]
struct EmbedInstance<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    predictions: Vec<EmbedPrediction>,
}

#[derive(Deserialize)]
struct EmbedPrediction {
    embeddings: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl VertexAiEmbedder {
    /// Create a new Vertex AI embedder for `model` in `location`
    pub fn new(
        auth: Arc<GcpAuth>,
        location: String,
        model: String,
        dimensions: Option<usize>,
    ) -> Self {
        Self {
            auth,
            model,
            location,
            dimensions,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:predict",
            loc = self.location,
            project = self.auth.project_id(),
            model = self.model
        )
    }

    async fn predict(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let token = self.auth.get_token().await?;
        let request = EmbedRequest {
            instances: texts
                .iter()
                .map(|t| EmbedInstance { content: t })
                .collect(),
        };

        let response = self
            .auth
            .http()
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Vertex AI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Vertex AI embedding failed ({}): {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse Vertex AI response: {}", e)))?;

        if parsed.predictions.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Vertex AI returned {} predictions for {} texts",
                parsed.predictions.len(),
                texts.len()
            )));
        }

        Ok(parsed
            .predictions
            .into_iter()
            .map(|p| p.embeddings.values)
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for VertexAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for group in texts.chunks(MAX_INSTANCES_PER_REQUEST) {
            vectors.extend(self.predict(group).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.auth.get_token().await.map(|_| true)
    }

    fn name(&self) -> &str {
        "vertex-ai"
    }
}
