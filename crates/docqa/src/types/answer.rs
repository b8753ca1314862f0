//! Answer table rows

use serde::Serialize;

use super::query::SourceRow;
use super::question::{QuestionTemplate, QuestionVariant};
use crate::generation::PromptBuilder;

/// One `(iteration key, question)` outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRow {
    /// Document ID or company name
    pub key: String,
    /// Question as sent to the model (with the key suffix)
    pub question: String,
    /// Fixed fields copied from the question definition
    pub template: QuestionTemplate,
    /// Model answer, or the not-found marker when the row failed
    pub answer: String,
    /// Failure message for rows that could not be answered
    pub error: Option<String>,
    /// Provenance of the context used
    pub sources: Vec<SourceRow>,
}

impl AnswerRow {
    /// Row with an answer from the model
    pub fn answered(
        key: &str,
        question: String,
        template: &QuestionTemplate,
        answer: String,
        sources: Vec<SourceRow>,
    ) -> Self {
        Self {
            key: key.to_string(),
            question,
            template: template.clone(),
            answer: answer.trim().to_string(),
            error: None,
            sources,
        }
    }

    /// Row recording a failure with the not-found marker as its answer
    pub fn failed(
        key: &str,
        question: String,
        template: &QuestionTemplate,
        marker: &str,
        error: String,
        sources: Vec<SourceRow>,
    ) -> Self {
        Self {
            key: key.to_string(),
            question,
            template: template.clone(),
            answer: marker.to_string(),
            error: Some(error),
            sources,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the model found an answer in the context
    pub fn has_answer(&self, marker: &str) -> bool {
        !self.is_failed() && !PromptBuilder::is_not_found(&self.answer, marker)
    }

    /// Benchmark rating: an answered row is marked "Yes" with the answer as detail
    pub fn apply_rating(&mut self, variant: QuestionVariant, marker: &str) {
        if variant != QuestionVariant::Benchmarking || !self.has_answer(marker) {
            return;
        }
        self.template.primary_details = Some("Yes".to_string());
        self.template.secondary_details = Some(self.answer.clone());
    }

    /// Sources joined for a single report cell
    pub fn sources_cell(&self) -> String {
        self.sources
            .iter()
            .map(SourceRow::format_inline)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> QuestionTemplate {
        QuestionTemplate {
            question: "Is there a climate target?".into(),
            primary_details: Some("No".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rating_only_applies_to_answered_benchmark_rows() {
        let mut row = AnswerRow::answered(
            "AMETEK",
            "q".into(),
            &template(),
            " Net zero by 2050 ".into(),
            vec![],
        );
        row.apply_rating(QuestionVariant::Benchmarking, "NULL");
        assert_eq!(row.template.primary_details.as_deref(), Some("Yes"));
        assert_eq!(row.template.secondary_details.as_deref(), Some("Net zero by 2050"));

        let mut null_row =
            AnswerRow::answered("AMETEK", "q".into(), &template(), "null".into(), vec![]);
        null_row.apply_rating(QuestionVariant::Benchmarking, "NULL");
        assert_eq!(null_row.template.primary_details.as_deref(), Some("No"));

        let mut doc_row =
            AnswerRow::answered("MG206855", "q".into(), &template(), "yes".into(), vec![]);
        doc_row.apply_rating(QuestionVariant::DocumentAnalysis, "NULL");
        assert_eq!(doc_row.template.primary_details.as_deref(), Some("No"));
    }

    #[test]
    fn test_failed_row_uses_marker() {
        let row =
            AnswerRow::failed("IDEX", "q".into(), &template(), "NULL", "quota".into(), vec![]);
        assert!(row.is_failed());
        assert_eq!(row.answer, "NULL");
        assert!(!row.has_answer("NULL"));
    }
}
