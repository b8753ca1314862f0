//! Report writers

mod report;

pub use report::{answer_headers, write_answers, write_answers_to, write_chunks, write_chunks_to};
