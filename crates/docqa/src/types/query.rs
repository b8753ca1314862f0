//! Retrieval result types

use serde::Serialize;

use super::document::EmbeddedChunk;

/// A retrieved chunk and its similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: EmbeddedChunk,
    /// Similarity score under the configured metric (higher is better)
    pub score: f32,
}

/// Provenance row for one selected chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRow {
    /// Source filename
    pub file_name: String,
    /// Page number (if applicable)
    pub page_number: Option<u32>,
    /// Chunk text supplied as context
    pub chunk_text: String,
}

impl SourceRow {
    /// Format source for inline display
    pub fn format_inline(&self) -> String {
        match self.page_number {
            Some(page) => format!("{} p.{}", self.file_name, page),
            None => self.file_name.clone(),
        }
    }
}

/// Outcome of a top-K query
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Selected chunks, best first
    pub ranked: Vec<ScoredChunk>,
    /// Chunk texts joined by a single space, in ranked order
    pub context: String,
    /// Provenance of the selected chunks, in ranked order
    pub sources: Vec<SourceRow>,
}

impl QueryResult {
    /// Assemble context and provenance from ranked chunks
    pub fn from_ranked(ranked: Vec<ScoredChunk>) -> Self {
        let context = ranked
            .iter()
            .map(|r| r.chunk.text())
            .collect::<Vec<_>>()
            .join(" ");

        let sources = ranked
            .iter()
            .map(|r| {
                let chunk = r.chunk.chunk();
                SourceRow {
                    file_name: chunk.file_name.clone(),
                    page_number: chunk.page_number,
                    chunk_text: chunk.text.clone(),
                }
            })
            .collect();

        Self {
            ranked,
            context,
            sources,
        }
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Keep the best chunks whose space-joined texts fit in `max_chars`.
    /// The best chunk is always kept.
    pub fn truncated_to(self, max_chars: usize) -> Self {
        let mut kept = Vec::with_capacity(self.ranked.len());
        let mut used = 0usize;

        for scored in self.ranked {
            let len = scored.chunk.text().chars().count();
            let needed = if kept.is_empty() { len } else { used + 1 + len };
            if !kept.is_empty() && needed > max_chars {
                break;
            }
            used = needed;
            kept.push(scored);
        }

        Self::from_ranked(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::{Chunk, DocumentUnit, FileType};

    fn scored(text: &str, page: u32, score: f32) -> ScoredChunk {
        let unit = DocumentUnit::new("r.pdf", FileType::Pdf, Some(page), text).unwrap();
        let chunk = Chunk::from_unit(&unit, 0, text);
        ScoredChunk {
            chunk: EmbeddedChunk::new(chunk, vec![1.0]).unwrap(),
            score,
        }
    }

    #[test]
    fn test_context_and_sources_follow_rank_order() {
        let result =
            QueryResult::from_ranked(vec![scored("beta", 2, 0.9), scored("alpha", 1, 0.5)]);
        assert_eq!(result.context, "beta alpha");
        assert_eq!(result.sources[0].page_number, Some(2));
        assert_eq!(result.sources[1].chunk_text, "alpha");
        assert_eq!(result.sources[0].format_inline(), "r.pdf p.2");
    }

    #[test]
    fn test_truncation_keeps_best_chunks() {
        let result = QueryResult::from_ranked(vec![
            scored("aaaa", 1, 0.9),
            scored("bbbb", 2, 0.8),
            scored("cccc", 3, 0.7),
        ]);
        let trimmed = result.truncated_to(9);
        assert_eq!(trimmed.context, "aaaa bbbb");
        assert_eq!(trimmed.len(), 2);

        let single = QueryResult::from_ranked(vec![scored("aaaaaaaa", 1, 0.9)]).truncated_to(3);
        assert_eq!(single.len(), 1);
    }
}
