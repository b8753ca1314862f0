//! Document units, chunks and embedded chunks with provenance

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Supported file types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Excel spreadsheet (.xlsx, .xls)
    Xlsx,
    /// HTML document
    Html,
    /// CSV file
    Csv,
    /// Anything else; carries the lowercased extension
    Other(String),
}

impl FileType {
    /// Determine file type from extension
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" => Self::Pptx,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            "xlsx" | "xls" => Self::Xlsx,
            "html" | "htm" => Self::Html,
            "csv" => Self::Csv,
            _ => Self::Other(ext),
        }
    }

    /// Determine file type from a path's extension
    pub fn from_path(path: &std::path::Path) -> Self {
        Self::from_extension(
            path.extension()
                .map(|e| e.to_string_lossy())
                .as_deref()
                .unwrap_or(""),
        )
    }

    /// Check if the default extractor can read this type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Whether units of this type carry page numbers
    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::Pdf)
    }

    /// Extension as written in reports (".pdf", ".txt", ...)
    pub fn extension(&self) -> String {
        let ext = match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Txt => "txt",
            Self::Markdown => "md",
            Self::Xlsx => "xlsx",
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Other(ext) => ext.as_str(),
        };
        format!(".{}", ext)
    }
}

/// One page of a paginated file, or one whole non-paginated file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUnit {
    file_name: String,
    file_type: FileType,
    page_number: Option<u32>,
    content: String,
}

impl DocumentUnit {
    /// Create a unit, rejecting an empty file name or a zero page number
    pub fn new(
        file_name: impl Into<String>,
        file_type: FileType,
        page_number: Option<u32>,
        content: impl Into<String>,
    ) -> Result<Self> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(Error::invalid_argument("document unit needs a file name"));
        }
        if page_number == Some(0) {
            return Err(Error::invalid_argument(format!(
                "page numbers start at 1 ({})",
                file_name
            )));
        }

        Ok(Self {
            file_name,
            file_type,
            page_number,
            content: content.into(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_type(&self) -> &FileType {
        &self.file_type
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Order by file name, then page number, with unpaged units last
pub fn compare_units(a: &DocumentUnit, b: &DocumentUnit) -> Ordering {
    a.file_name
        .cmp(&b.file_name)
        .then_with(|| compare_pages(a.page_number, b.page_number))
}

fn compare_pages(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort units in place (stable)
pub fn sort_units(units: &mut [DocumentUnit]) {
    units.sort_by(compare_units);
}

/// A bounded-length piece of a unit's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source file name
    pub file_name: String,
    /// Source page (None for non-paginated files)
    pub page_number: Option<u32>,
    /// Position within the source unit
    pub index: u32,
    /// Chunk text
    pub text: String,
}

impl Chunk {
    /// Create a chunk inheriting provenance from its unit
    pub fn from_unit(unit: &DocumentUnit, index: u32, text: impl Into<String>) -> Self {
        Self {
            file_name: unit.file_name.clone(),
            page_number: unit.page_number,
            index,
            text: text.into(),
        }
    }

    /// Format source for display ("report.pdf, Page 3")
    pub fn format_source(&self) -> String {
        match self.page_number {
            Some(page) => format!("{}, Page {}", self.file_name, page),
            None => self.file_name.clone(),
        }
    }
}

/// A chunk with its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

impl EmbeddedChunk {
    /// Pair a chunk with its vector; an empty vector is rejected
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Result<Self> {
        if embedding.is_empty() {
            return Err(Error::embedding(format!(
                "empty embedding for chunk {} of {}",
                chunk.index,
                chunk.format_source()
            )));
        }
        Ok(Self { chunk, embedding })
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }
}
