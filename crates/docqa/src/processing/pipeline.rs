//! Question-answering pipeline: chunk, index once, answer every (key, question)

use std::sync::Arc;

use crate::config::DocQaConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::ingestion::TextChunker;
use crate::providers::{EmbeddingProvider, LlmProvider, RetryPolicy};
use crate::retrieval::{EmbeddingIndex, IndexOptions, Retriever};
use crate::types::{AnswerRow, DocumentUnit, QueryResult, QuestionSet, QuestionTemplate};

/// Answer produced for a single free-form question
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub retrieval: QueryResult,
}

/// The whole run: one index, many questions
pub struct QaPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    retriever: Retriever,
    retry: RetryPolicy,
    index_options: IndexOptions,
    top_k: usize,
    not_found_marker: String,
    max_context_chars: Option<usize>,
}

impl QaPipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(
        config: &DocQaConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let retry = RetryPolicy::from_config(&config.retry);

        Ok(Self {
            chunker: TextChunker::from_config(&config.chunking)?,
            retriever: Retriever::new(
                Arc::clone(&embedder),
                retry.clone(),
                config.retrieval.metric,
            ),
            embedder,
            llm,
            retry,
            index_options: IndexOptions::from_config(&config.embeddings),
            top_k: config.retrieval.top_k,
            not_found_marker: config.generation.not_found_marker.clone(),
            max_context_chars: config.generation.max_context_chars,
        })
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    pub fn not_found_marker(&self) -> &str {
        &self.not_found_marker
    }

    /// Clean, chunk and embed every unit into one index
    pub async fn prepare(&self, units: &[DocumentUnit]) -> Result<EmbeddingIndex> {
        let chunks = self.chunker.chunk_units(units)?;
        let index = EmbeddingIndex::build(
            chunks,
            self.embedder.as_ref(),
            &self.retry,
            &self.index_options,
        )
        .await?;

        if index.is_empty() {
            return Err(Error::EmptyIndex);
        }
        Ok(index)
    }

    /// Retrieve context for `question` and generate a grounded answer
    pub async fn ask(&self, index: &EmbeddingIndex, question: &str) -> Result<Answer> {
        let retrieval = self.retrieve(index, question).await?;
        let text = self.generate(&retrieval, question).await?;
        Ok(Answer { text, retrieval })
    }

    /// Answer every template for every key, in key-major order.
    ///
    /// A row whose retrieval or generation fails after retries records the
    /// not-found marker and the error; structural errors abort the run.
    pub async fn answer_all(
        &self,
        index: &EmbeddingIndex,
        questions: &QuestionSet,
        keys: &[String],
    ) -> Result<Vec<AnswerRow>> {
        if keys.is_empty() {
            return Err(Error::invalid_argument("at least one iteration key is required"));
        }

        let mut rows = Vec::with_capacity(keys.len() * questions.len());
        for key in keys {
            tracing::info!(
                "Answering {} question(s) for {} = {}",
                questions.len(),
                questions.variant.key_column(),
                key
            );
            for template in &questions.questions {
                let mut row = self.answer_row(index, key, template).await?;
                row.apply_rating(questions.variant, &self.not_found_marker);
                rows.push(row);
            }
        }

        let failed = rows.iter().filter(|r| r.is_failed()).count();
        if failed > 0 {
            tracing::warn!(
                "{} of {} row(s) failed and were recorded as {}",
                failed,
                rows.len(),
                self.not_found_marker
            );
        }
        Ok(rows)
    }

    async fn answer_row(
        &self,
        index: &EmbeddingIndex,
        key: &str,
        template: &QuestionTemplate,
    ) -> Result<AnswerRow> {
        let question = template.for_key(key);
        let marker = self.not_found_marker.as_str();

        let retrieval = match self.retrieve(index, &question).await {
            Ok(retrieval) => retrieval,
            Err(e) if e.is_structural() => return Err(e),
            Err(e) => {
                tracing::warn!("Retrieval failed for '{}': {}", question, e);
                return Ok(AnswerRow::failed(
                    key,
                    question,
                    template,
                    marker,
                    e.to_string(),
                    Vec::new(),
                ));
            }
        };

        match self.generate(&retrieval, &question).await {
            Ok(answer) => {
                let answer = if PromptBuilder::is_not_found(&answer, marker) {
                    marker.to_string()
                } else {
                    answer
                };
                Ok(AnswerRow::answered(key, question, template, answer, retrieval.sources))
            }
            Err(e) if e.is_structural() => Err(e),
            Err(e) => {
                tracing::warn!("Generation failed for '{}': {}", question, e);
                Ok(AnswerRow::failed(
                    key,
                    question,
                    template,
                    marker,
                    e.to_string(),
                    retrieval.sources,
                ))
            }
        }
    }

    async fn retrieve(&self, index: &EmbeddingIndex, question: &str) -> Result<QueryResult> {
        let result = self.retriever.query(question, index, self.top_k).await?;
        Ok(match self.max_context_chars {
            Some(limit) => result.truncated_to(limit),
            None => result,
        })
    }

    async fn generate(&self, retrieval: &QueryResult, question: &str) -> Result<String> {
        let prompt =
            PromptBuilder::answer_prompt(&retrieval.context, question, &self.not_found_marker);
        let label = format!("generate with {}", self.llm.model());
        self.retry
            .execute(&label, || self.llm.generate(&prompt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::rank;
    use crate::testing::{FakeEmbedder, FakeLlm};
    use crate::types::{FileType, QuestionVariant};

    fn config() -> DocQaConfig {
        let mut config = DocQaConfig::default();
        config.retry.max_attempts = 2;
        config.retry.initial_backoff_ms = 0;
        config.retry.max_backoff_ms = 0;
        config.retry.call_timeout_secs = 0;
        config
    }

    fn words(total_chars: usize) -> String {
        "abcd ".repeat(total_chars / 5 + 1)[..total_chars].to_string()
    }

    fn two_documents() -> Vec<DocumentUnit> {
        vec![
            DocumentUnit::new("a.txt", FileType::Txt, None, words(12_000)).unwrap(),
            DocumentUnit::new("b.txt", FileType::Txt, None, words(12_000)).unwrap(),
        ]
    }

    fn questions(variant: QuestionVariant) -> QuestionSet {
        QuestionSet {
            variant,
            questions: vec![
                QuestionTemplate {
                    question: "Q1 what is the vendor?".into(),
                    ..Default::default()
                },
                QuestionTemplate {
                    question: "Q2 what is the value?".into(),
                    ..Default::default()
                },
            ],
        }
    }

    fn pipeline(llm: FakeLlm) -> (QaPipeline, Arc<FakeLlm>) {
        let llm = Arc::new(llm);
        let pipeline =
            QaPipeline::new(&config(), Arc::new(FakeEmbedder::new(8)), llm.clone()).unwrap();
        (pipeline, llm)
    }

    #[tokio::test]
    async fn test_end_to_end_two_documents() {
        let (pipeline, llm) = pipeline(FakeLlm::answering("Acme Corp"));
        let index = pipeline.prepare(&two_documents()).await.unwrap();
        assert_eq!(index.len(), 6);

        let keys = vec!["MG206855".to_string()];
        let rows = pipeline
            .answer_all(&index, &questions(QuestionVariant::DocumentAnalysis), &keys)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].question, "Q1 what is the vendor? For MG206855");
        assert_eq!(rows[0].answer, "Acme Corp");
        assert_eq!(rows[0].sources.len(), 5);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Q2 what is the value? For MG206855"));
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_null_row() {
        let (pipeline, llm) = pipeline(FakeLlm::answering("yes").failing_on("Q2"));
        let index = pipeline.prepare(&two_documents()).await.unwrap();
        let keys = vec!["IDEX".to_string(), "AMETEK".to_string()];

        let rows = pipeline
            .answer_all(&index, &questions(QuestionVariant::Benchmarking), &keys)
            .await
            .unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].answer, "NULL");
        assert!(rows[1].error.as_deref().unwrap().contains("quota"));
        assert_eq!(rows[3].key, "AMETEK");
        assert!(rows[3].is_failed());

        // successful benchmark rows are rated
        assert_eq!(rows[0].template.primary_details.as_deref(), Some("Yes"));
        assert_eq!(rows[0].template.secondary_details.as_deref(), Some("yes"));
        assert_eq!(rows[1].template.primary_details, None);

        // two questions that fail twice each, two that succeed once, for two keys
        assert_eq!(llm.prompts().len(), 2 * (1 + 2));
    }

    #[tokio::test]
    async fn test_not_found_reply_is_normalized() {
        let (pipeline, _) = pipeline(FakeLlm::answering(" null. "));
        let index = pipeline.prepare(&two_documents()).await.unwrap();
        let rows = pipeline
            .answer_all(&index, &questions(QuestionVariant::Benchmarking), &["ACME".to_string()])
            .await
            .unwrap();

        assert_eq!(rows[0].answer, "NULL");
        assert!(!rows[0].is_failed());
        assert_eq!(rows[0].template.primary_details, None);
    }

    #[tokio::test]
    async fn test_prepare_with_no_text_is_empty_index() {
        let (pipeline, _) = pipeline(FakeLlm::answering("x"));
        let units = vec![DocumentUnit::new("blank.txt", FileType::Txt, None, " \n ").unwrap()];
        assert!(matches!(pipeline.prepare(&units).await, Err(Error::EmptyIndex)));
    }

    #[tokio::test]
    async fn test_context_limit_drops_lowest_ranked_chunks() {
        let mut config = config();
        config.generation.max_context_chars = Some(6_000);
        let pipeline = QaPipeline::new(
            &config,
            Arc::new(FakeEmbedder::new(8)),
            Arc::new(FakeLlm::answering("ok")),
        )
        .unwrap();
        let index = pipeline.prepare(&two_documents()).await.unwrap();

        let answer = pipeline.ask(&index, "anything").await.unwrap();
        assert_eq!(answer.text, "ok");

        let query = FakeEmbedder::new(8).embed("anything").await.unwrap();
        let full = rank(&query, &index, config.retrieval.top_k, config.retrieval.metric).unwrap();
        let kept = answer.retrieval.len();
        let context_chars = answer.retrieval.context.chars().count();

        assert!(kept >= 1 && kept < full.len());
        assert!(context_chars <= 6_000);
        for (kept_chunk, ranked) in answer.retrieval.ranked.iter().zip(&full) {
            assert_eq!(kept_chunk.chunk.text(), ranked.chunk.text());
        }
        // the next-ranked chunk would overflow the limit
        let next_chars = full[kept].chunk.text().chars().count();
        assert!(context_chars + 1 + next_chars > 6_000);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_becomes_null_row() {
        let llm = Arc::new(FakeLlm::answering("yes"));
        let pipeline = QaPipeline::new(
            &config(),
            Arc::new(FakeEmbedder::new(8).failing_on("Q2")),
            llm.clone(),
        )
        .unwrap();
        let index = pipeline.prepare(&two_documents()).await.unwrap();
        let keys = vec!["MG206855".to_string(), "MG206856".to_string()];
        let set = questions(QuestionVariant::DocumentAnalysis);

        let rows = pipeline.answer_all(&index, &set, &keys).await.unwrap();

        assert_eq!(rows.len(), keys.len() * set.len());
        for row in [&rows[1], &rows[3]] {
            assert!(row.question.starts_with("Q2"));
            assert!(row.is_failed());
            assert_eq!(row.answer, "NULL");
            assert!(row.sources.is_empty());
        }
        assert_eq!(rows[0].answer, "yes");
        assert_eq!(rows[2].answer, "yes");
        // generation never runs for rows whose retrieval failed
        assert_eq!(llm.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_no_keys_is_rejected() {
        let (pipeline, _) = pipeline(FakeLlm::answering("x"));
        let index = pipeline.prepare(&two_documents()).await.unwrap();
        let result = pipeline
            .answer_all(&index, &questions(QuestionVariant::DocumentAnalysis), &[])
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
