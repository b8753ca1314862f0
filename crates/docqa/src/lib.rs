//! docqa: question answering over document sets with retrieval-grounded prompts
//!
//! Documents are extracted into page-level units, chunked, embedded once into
//! an in-memory index, and every `(key, question)` pair is answered from the
//! top-K most similar chunks. Answers are written to a CSV table with
//! provenance.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod output;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::DocQaConfig;
pub use error::{Error, Result};
pub use processing::QaPipeline;
pub use types::{
    AnswerRow, Chunk, DocumentUnit, EmbeddedChunk, FileType, QueryResult, QuestionSet,
    QuestionVariant,
};
