//! Embedding index and similarity search

mod index;
mod search;
mod similarity;

pub use index::{EmbeddingIndex, IndexOptions, SkippedChunk};
pub use search::{rank, Retriever};
pub use similarity::SimilarityMetric;
