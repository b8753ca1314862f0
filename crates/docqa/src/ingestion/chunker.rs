//! Whitespace-aware text chunking with provenance

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, DocumentUnit};

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"));

/// Cleaning applied to unit content before chunking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextCleaning {
    /// Replace every run of non-alphanumeric characters with one space
    #[default]
    Alphanumeric,
    /// Leave content untouched
    None,
}

impl TextCleaning {
    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::Alphanumeric => NON_ALPHANUMERIC.replace_all(text, " ").into_owned(),
            Self::None => text.to_string(),
        }
    }
}

/// Split `text` into pieces of at most `max_length` characters.
///
/// Each split happens at the last whitespace character inside the window
/// `[start, start + max_length]`; that character is consumed. A window with
/// no whitespace is cut hard at `max_length`. The remainder after the last
/// split is always emitted, even when empty.
pub fn chunk(text: &str, max_length: usize) -> Result<Vec<String>> {
    if max_length == 0 {
        return Err(Error::invalid_argument("max_length must be greater than 0"));
    }

    // Byte offset of every char plus the end of the string
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut pieces = Vec::with_capacity(len / max_length + 1);
    let mut start = 0usize;

    while start + max_length < len {
        let window_end = start + max_length;
        match (start..=window_end).rev().find(|&i| chars[i].is_whitespace()) {
            Some(end) => {
                pieces.push(text[offsets[start]..offsets[end]].to_string());
                start = end + 1;
            }
            None => {
                pieces.push(text[offsets[start]..offsets[window_end]].to_string());
                start = window_end;
            }
        }
    }

    pieces.push(text[offsets[start]..].to_string());
    Ok(pieces)
}

/// Text chunker with a configured size and cleaning policy
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    cleaning: TextCleaning,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, cleaning: TextCleaning) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid_argument("chunk_size must be greater than 0"));
        }
        Ok(Self {
            chunk_size,
            cleaning,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.cleaning)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Chunk one unit; chunk indices are positions within the unit
    pub fn chunk_unit(&self, unit: &DocumentUnit) -> Result<Vec<Chunk>> {
        let cleaned = self.cleaning.apply(unit.content());
        let pieces = chunk(&cleaned, self.chunk_size)?;

        Ok(pieces
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| Chunk::from_unit(unit, i as u32, text))
            .collect())
    }

    /// Chunk every unit in order, dropping blank chunks
    pub fn chunk_units(&self, units: &[DocumentUnit]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for unit in units {
            let unit_chunks = self.chunk_unit(unit)?;
            tracing::debug!(
                "{}: {} chunk(s) from page {:?}",
                unit.file_name(),
                unit_chunks.len(),
                unit.page_number()
            );
            chunks.extend(unit_chunks);
        }
        tracing::info!("Chunked {} unit(s) into {} chunk(s)", units.len(), chunks.len());
        Ok(chunks)
    }
}
