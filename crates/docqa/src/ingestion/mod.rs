//! Document ingestion: extraction, cleaning and chunking

mod chunker;
mod parser;
mod source;

pub use chunker::{chunk, TextChunker, TextCleaning};
pub use parser::FileParser;
pub use source::{collect_units, Extractor, FileExtractor};
