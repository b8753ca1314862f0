//! Top-K retrieval over an embedding index

use std::sync::Arc;

use super::index::EmbeddingIndex;
use super::similarity::SimilarityMetric;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, RetryPolicy};
use crate::types::{QueryResult, ScoredChunk};

/// Rank every entry of `index` against `query` and keep the best `k`.
///
/// Sorting is stable, so equal scores keep insertion order. `k` larger than
/// the index returns every entry. A NaN score ranks below every real score.
pub fn rank(
    query: &[f32],
    index: &EmbeddingIndex,
    k: usize,
    metric: SimilarityMetric,
) -> Result<Vec<ScoredChunk>> {
    if k == 0 {
        return Err(Error::invalid_argument("k must be greater than 0"));
    }
    if index.is_empty() {
        return Err(Error::EmptyIndex);
    }
    if let Some(expected) = index.dimensions() {
        if expected != query.len() {
            return Err(Error::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
    }

    let mut scored: Vec<(usize, f32)> = index
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let score = metric.score(query, entry.embedding());
            (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(scored
        .into_iter()
        .take(k)
        .map(|(i, score)| ScoredChunk {
            chunk: index.entries()[i].clone(),
            score,
        })
        .collect())
}

/// Embeds questions and ranks index entries against them
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    metric: SimilarityMetric,
}

impl Retriever {
    /// Create a retriever; `embedder` must be the one that built the index
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
        metric: SimilarityMetric,
    ) -> Self {
        Self {
            embedder,
            retry,
            metric,
        }
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Retrieve the `k` chunks most similar to `question`
    pub async fn query(
        &self,
        question: &str,
        index: &EmbeddingIndex,
        k: usize,
    ) -> Result<QueryResult> {
        if k == 0 {
            return Err(Error::invalid_argument("k must be greater than 0"));
        }
        if index.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let query_vector = self
            .retry
            .execute("embed question", || self.embedder.embed(question))
            .await?;

        let ranked = rank(&query_vector, index, k, self.metric)?;
        tracing::debug!(
            "Retrieved {} chunk(s) for question (best score {:.4})",
            ranked.len(),
            ranked.first().map(|r| r.score).unwrap_or_default()
        );

        Ok(QueryResult::from_ranked(ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEmbedder;
    use crate::types::{Chunk, DocumentUnit, EmbeddedChunk, FileType};

    fn index_of(vectors: &[(&str, Vec<f32>)]) -> EmbeddingIndex {
        let mut index = EmbeddingIndex::new(None);
        for (page, (text, vector)) in vectors.iter().enumerate() {
            let unit =
                DocumentUnit::new("r.pdf", FileType::Pdf, Some(page as u32 + 1), *text).unwrap();
            let chunk = Chunk::from_unit(&unit, 0, *text);
            index
                .insert(EmbeddedChunk::new(chunk, vector.clone()).unwrap())
                .unwrap();
        }
        index
    }

    fn five() -> EmbeddingIndex {
        index_of(&[
            ("chunk1", vec![1.0, 0.0]),
            ("chunk2", vec![0.0, 1.0]),
            ("chunk3", vec![0.9, 0.1]),
            ("chunk4", vec![0.5, 0.5]),
            ("chunk5", vec![-1.0, 0.0]),
        ])
    }

    #[test]
    fn test_top_two_by_dot_product() {
        let ranked = rank(&[1.0, 0.0], &five(), 2, SimilarityMetric::Dot).unwrap();
        let texts: Vec<_> = ranked.iter().map(|r| r.chunk.text()).collect();
        assert_eq!(texts, vec!["chunk1", "chunk3"]);
        assert_eq!(ranked[0].score, 1.0);
        assert!((ranked[1].score - 0.9).abs() < 1e-6);

        let result = QueryResult::from_ranked(ranked);
        assert_eq!(result.context, "chunk1 chunk3");
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let ranked = rank(&[1.0, 0.0], &five(), 100, SimilarityMetric::Dot).unwrap();
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked.last().unwrap().chunk.text(), "chunk5");
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index_of(&[
            ("first", vec![1.0, 0.0]),
            ("second", vec![1.0, 0.0]),
            ("third", vec![1.0, 0.0]),
        ]);
        for _ in 0..3 {
            let ranked = rank(&[1.0, 0.0], &index, 3, SimilarityMetric::Cosine).unwrap();
            let texts: Vec<_> = ranked.iter().map(|r| r.chunk.text()).collect();
            assert_eq!(texts, vec!["first", "second", "third"]);
        }
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let index = index_of(&[
            ("broken", vec![f32::NAN, 0.0]),
            ("west", vec![-1.0, 0.0]),
            ("east", vec![1.0, 0.0]),
            ("inf", vec![f32::INFINITY, f32::NAN]),
        ]);
        for metric in [SimilarityMetric::Dot, SimilarityMetric::Cosine] {
            let ranked = rank(&[1.0, 0.0], &index, 4, metric).unwrap();
            let texts: Vec<_> = ranked.iter().map(|r| r.chunk.text()).collect();
            assert_eq!(texts, vec!["east", "west", "broken", "inf"]);
            assert_eq!(ranked[3].score, f32::NEG_INFINITY);
        }
    }

    #[test]
    fn test_rank_rejects_bad_input() {
        assert!(matches!(
            rank(&[1.0, 0.0], &five(), 0, SimilarityMetric::Dot),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            rank(&[1.0, 0.0], &EmbeddingIndex::new(None), 3, SimilarityMetric::Dot),
            Err(Error::EmptyIndex)
        ));
        assert!(matches!(
            rank(&[1.0, 0.0, 0.0], &five(), 3, SimilarityMetric::Dot),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_query_embeds_question_and_builds_context() {
        let embedder = FakeEmbedder::new(2).with_vector("which is east?", vec![1.0, 0.0]);
        let retriever =
            Retriever::new(Arc::new(embedder), RetryPolicy::no_retry(), SimilarityMetric::Dot);

        let result = retriever.query("which is east?", &five(), 2).await.unwrap();
        assert_eq!(result.context, "chunk1 chunk3");
        assert_eq!(result.sources[1].page_number, Some(3));
    }

    #[tokio::test]
    async fn test_empty_index_fails_before_embedding() {
        let embedder = Arc::new(FakeEmbedder::new(2));
        let retriever = Retriever::new(
            embedder.clone(),
            RetryPolicy::no_retry(),
            SimilarityMetric::Cosine,
        );

        let result = retriever.query("anything", &EmbeddingIndex::new(None), 5).await;
        assert!(matches!(result, Err(Error::EmptyIndex)));
        assert_eq!(embedder.calls(), 0);
    }
}
