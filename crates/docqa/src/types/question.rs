//! Question definitions loaded from JSON

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};

/// Which question file layout was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionVariant {
    /// `documentResponse[].documentDetails[]`, keyed by document ID
    DocumentAnalysis,
    /// `esgResponse[].benchmarkDetails[]`, keyed by company
    Benchmarking,
}

impl QuestionVariant {
    /// Header of the key column in the answer table
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::DocumentAnalysis => "documentID",
            Self::Benchmarking => "company",
        }
    }
}

/// One question and the fixed fields that travel with it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTemplate {
    pub question: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub citation_details: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub page_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub esg_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub esg_indicators: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub primary_details: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub secondary_details: Option<String>,
}

impl QuestionTemplate {
    /// Question text as sent for one iteration key
    pub fn for_key(&self, key: &str) -> String {
        format!("{} For {}", self.question.trim_end(), key)
    }
}

/// All questions of one definition file
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    pub variant: QuestionVariant,
    pub questions: Vec<QuestionTemplate>,
}

#[derive(Deserialize)]
struct QuestionFile {
    #[serde(rename = "documentResponse")]
    document_response: Option<Vec<DocumentBlock>>,
    #[serde(rename = "esgResponse")]
    esg_response: Option<Vec<BenchmarkBlock>>,
}

#[derive(Deserialize)]
struct DocumentBlock {
    #[serde(rename = "documentDetails", default)]
    details: Vec<QuestionTemplate>,
}

#[derive(Deserialize)]
struct BenchmarkBlock {
    #[serde(rename = "benchmarkDetails", default)]
    details: Vec<QuestionTemplate>,
}

impl QuestionSet {
    /// Parse a question definition document
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: QuestionFile = serde_json::from_str(raw)?;

        let (variant, questions) = match (file.document_response, file.esg_response) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "question file has both documentResponse and esgResponse".into(),
                ))
            }
            (Some(blocks), None) => (
                QuestionVariant::DocumentAnalysis,
                blocks.into_iter().flat_map(|b| b.details).collect::<Vec<_>>(),
            ),
            (None, Some(blocks)) => (
                QuestionVariant::Benchmarking,
                blocks.into_iter().flat_map(|b| b.details).collect::<Vec<_>>(),
            ),
            (None, None) => {
                return Err(Error::Config(
                    "question file needs a documentResponse or esgResponse array".into(),
                ))
            }
        };

        if questions.is_empty() {
            return Err(Error::Config("question file contains no questions".into()));
        }
        if let Some(pos) = questions.iter().position(|q| q.question.trim().is_empty()) {
            return Err(Error::Config(format!("question #{} is blank", pos + 1)));
        }

        Ok(Self { variant, questions })
    }

    /// Load a question definition file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read questions {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Parse newline-delimited iteration keys; blank lines and `#` comments are skipped
pub fn parse_keys(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Accept strings, numbers, booleans and arrays where a text field is expected
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_text))
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other @ Value::Object(_) => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_analysis_file() {
        let raw = r#"{
            "documentResponse": [{
                "documentDetails": [
                    {"question": "What is the vendor name?", "citationDetails": "Section 1", "pageNumber": 2},
                    {"question": "What is the contract value?", "citationDetails": null, "pageNumber": "4-5"}
                ]
            }]
        }"#;
        let set = QuestionSet::from_json(raw).unwrap();
        assert_eq!(set.variant, QuestionVariant::DocumentAnalysis);
        assert_eq!(set.variant.key_column(), "documentID");
        assert_eq!(set.len(), 2);
        assert_eq!(set.questions[0].page_number.as_deref(), Some("2"));
        assert_eq!(set.questions[1].page_number.as_deref(), Some("4-5"));
        assert_eq!(set.questions[1].citation_details, None);
        assert_eq!(
            set.questions[0].for_key("MG206855"),
            "What is the vendor name? For MG206855"
        );
    }

    #[test]
    fn test_benchmarking_file() {
        let raw = r#"{
            "esgResponse": [{
                "benchmarkDetails": [{
                    "question": "Does the company report scope 3 emissions?",
                    "esgType": "Environmental",
                    "esgIndicators": ["GHG", "Scope 3"],
                    "primaryDetails": "",
                    "secondaryDetails": "",
                    "citationDetails": "",
                    "pageNumber": ""
                }]
            }, {
                "benchmarkDetails": [{"question": "Is there a board diversity policy?"}]
            }]
        }"#;
        let set = QuestionSet::from_json(raw).unwrap();
        assert_eq!(set.variant, QuestionVariant::Benchmarking);
        assert_eq!(set.variant.key_column(), "company");
        assert_eq!(set.len(), 2);
        assert_eq!(set.questions[0].esg_indicators.as_deref(), Some("GHG, Scope 3"));
        assert_eq!(set.questions[1].esg_type, None);
    }

    #[test]
    fn test_rejects_unknown_or_empty_layouts() {
        assert!(matches!(
            QuestionSet::from_json(r#"{"questions": []}"#),
            Err(Error::Config(_))
        ));
        assert!(
            QuestionSet::from_json(r#"{"documentResponse": [{"documentDetails": []}]}"#).is_err()
        );
        assert!(QuestionSet::from_json(
            r#"{"documentResponse": [{"documentDetails": [{"question": "  "}]}]}"#
        )
        .is_err());
        assert!(matches!(QuestionSet::from_json("not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_parse_keys() {
        let keys = parse_keys("MG206855\n\n# skipped\n  MK231582  \n");
        assert_eq!(keys, vec!["MG206855", "MK231582"]);
    }
}
