//! In-memory embedding index built once per run

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, RetryPolicy};
use crate::types::{Chunk, EmbeddedChunk};

/// How an index is built
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Chunks per embedding call
    pub batch_size: usize,
    /// Embedding calls in flight at once
    pub concurrency: usize,
    /// Expected vector dimension (inferred when None)
    pub dimensions: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

impl IndexOptions {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.effective_concurrency(),
            dimensions: config.dimensions,
        }
    }
}

/// A chunk left out of the index, with the reason
#[derive(Debug, Clone)]
pub struct SkippedChunk {
    pub chunk: Chunk,
    pub reason: String,
}

/// Embedded chunks sharing one vector dimension, in insertion order
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    entries: Vec<EmbeddedChunk>,
    dimensions: Option<usize>,
    skipped: Vec<SkippedChunk>,
}

impl EmbeddingIndex {
    /// Empty index, optionally pinned to a dimension
    pub fn new(dimensions: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            dimensions,
            skipped: Vec::new(),
        }
    }

    /// Embed every chunk and collect the ones that succeed.
    ///
    /// Per-chunk failures never fail the build: they are logged and reported
    /// through [`EmbeddingIndex::skipped`]. Entries keep the input order.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        retry: &RetryPolicy,
        options: &IndexOptions,
    ) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(Error::invalid_argument("batch_size must be greater than 0"));
        }
        if options.concurrency == 0 {
            return Err(Error::invalid_argument("concurrency must be greater than 0"));
        }

        let total = chunks.len();
        tracing::info!(
            "Embedding {} chunk(s) with {} ({} per call, {} in flight)",
            total,
            embedder.name(),
            options.batch_size,
            options.concurrency
        );

        let semaphore = Semaphore::new(options.concurrency);
        let groups: Vec<&[Chunk]> = chunks.chunks(options.batch_size).collect();
        let results = join_all(
            groups
                .into_iter()
                .map(|group| embed_group(group, embedder, retry, &semaphore)),
        )
        .await;

        let mut index = Self::new(options.dimensions.or_else(|| embedder.dimensions()));
        for (chunk, outcome) in chunks.iter().zip(results.into_iter().flatten()) {
            let accepted = outcome
                .and_then(|vector| EmbeddedChunk::new(chunk.clone(), vector))
                .and_then(|embedded| index.insert(embedded));

            if let Err(e) = accepted {
                tracing::warn!(
                    "Skipping chunk {} of {}: {}",
                    chunk.index,
                    chunk.format_source(),
                    e
                );
                index.skipped.push(SkippedChunk {
                    chunk: chunk.clone(),
                    reason: e.to_string(),
                });
            }
        }

        tracing::info!(
            "Indexed {} of {} chunk(s), {} skipped",
            index.len(),
            total,
            index.skipped.len()
        );
        Ok(index)
    }

    /// Add an embedded chunk; the first entry fixes the dimension when none is set
    pub fn insert(&mut self, chunk: EmbeddedChunk) -> Result<()> {
        match self.dimensions {
            Some(expected) if expected != chunk.dimensions() => {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: chunk.dimensions(),
                })
            }
            Some(_) => {}
            None => self.dimensions = Some(chunk.dimensions()),
        }
        self.entries.push(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn entries(&self) -> &[EmbeddedChunk] {
        &self.entries
    }

    /// Chunks excluded during [`EmbeddingIndex::build`]
    pub fn skipped(&self) -> &[SkippedChunk] {
        &self.skipped
    }
}

/// Embed one group, falling back to one call per chunk when the group call fails.
/// Returns exactly one outcome per chunk, in order.
async fn embed_group(
    group: &[Chunk],
    embedder: &dyn EmbeddingProvider,
    retry: &RetryPolicy,
    semaphore: &Semaphore,
) -> Vec<Result<Vec<f32>>> {
    let _permit = match semaphore.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            return group
                .iter()
                .map(|_| Err(Error::embedding(format!("worker pool closed: {}", e))))
                .collect()
        }
    };

    if let [chunk] = group {
        let label = format!("embed {}", chunk.format_source());
        return vec![retry.execute(&label, || embedder.embed(&chunk.text)).await];
    }

    let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
    match retry
        .execute("embed batch", || embedder.embed_batch(&texts))
        .await
    {
        Ok(vectors) if vectors.len() == group.len() => vectors.into_iter().map(Ok).collect(),
        outcome => {
            match outcome {
                Ok(vectors) => tracing::warn!(
                    "Batch of {} returned {} vectors, embedding individually",
                    group.len(),
                    vectors.len()
                ),
                Err(e) => tracing::warn!(
                    "Batch of {} failed ({}), embedding individually",
                    group.len(),
                    e
                ),
            }

            let mut outcomes = Vec::with_capacity(group.len());
            for chunk in group {
                let label = format!("embed {}", chunk.format_source());
                outcomes.push(retry.execute(&label, || embedder.embed(&chunk.text)).await);
            }
            outcomes
        }
    }
}
