//! Prompt templates for grounded answers

/// Prompt builder for context-grounded questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build a prompt that restricts the model to `context` and asks for
    /// `not_found_marker` when the answer is absent
    pub fn answer_prompt(context: &str, question: &str, not_found_marker: &str) -> String {
        format!(
            r#"Answer the question using ONLY the context below. Be brief and to the point.
If the answer is not contained in the context, respond with exactly "{marker}" and nothing else.

Context:
{context}

Question:
{question}

Answer:"#,
            marker = not_found_marker,
            context = context.trim(),
            question = question.trim(),
        )
    }

    /// Whether a model reply means "not found"
    pub fn is_not_found(answer: &str, not_found_marker: &str) -> bool {
        let answer = answer.trim().trim_matches(|c: char| c == '"' || c == '.');
        answer.is_empty() || answer.eq_ignore_ascii_case(not_found_marker)
    }
}
