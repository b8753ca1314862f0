//! Core types for the pipeline

pub mod answer;
pub mod document;
pub mod query;
pub mod question;

pub use answer::AnswerRow;
pub use document::{sort_units, Chunk, DocumentUnit, EmbeddedChunk, FileType};
pub use query::{QueryResult, ScoredChunk, SourceRow};
pub use question::{parse_keys, QuestionSet, QuestionTemplate, QuestionVariant};
